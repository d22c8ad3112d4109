use std::sync::{LazyLock, Mutex};

/// Serializes tests that touch process environment variables.
pub(super) static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Sets or clears one variable and restores the previous value on drop.
/// Callers must hold `ENV_LOCK`.
pub(super) struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl EnvVarGuard {
    pub(super) fn set(key: &'static str, value: &str) -> Self {
        Self::replace(key, Some(value))
    }

    pub(super) fn unset(key: &'static str) -> Self {
        Self::replace(key, None)
    }

    fn replace(key: &'static str, value: Option<&str>) -> Self {
        let previous = std::env::var(key).ok();
        apply(key, value);
        Self { key, previous }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        apply(self.key, self.previous.as_deref());
    }
}

fn apply(key: &str, value: Option<&str>) {
    // SAFETY: test-only; every caller holds ENV_LOCK so no other test thread
    // reads or writes the environment concurrently.
    unsafe {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}
