//! Exit code constants for the cadlock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: Shared lock directory unavailable or unreadable
//! - 3: Editor launch failure
//! - 4: Lease denied (resource held by another owner)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Storage failure: the shared lock directory could not be read or written.
pub const STORAGE_FAILURE: i32 = 2;

/// The external editor could not be started.
pub const LAUNCH_FAILURE: i32 = 3;

/// Lease denied: the resource is held by someone else.
pub const LOCK_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            STORAGE_FAILURE,
            LAUNCH_FAILURE,
            LOCK_FAILURE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}
