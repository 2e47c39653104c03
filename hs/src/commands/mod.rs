pub mod deploy;
pub mod dev;
pub mod upload;

use crate::config::GlobalConfig;

/// Resolve the target account from the `--account` flag, falling back to the
/// configured default account.
pub(crate) fn resolve_account(
    flag: Option<u64>,
    global: &GlobalConfig,
) -> Result<u64, Box<dyn std::error::Error>> {
    flag.or(global.default_account).ok_or_else(|| {
        "No account specified. Pass --account=<id> or configure a default account.".into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_flag_wins_over_default() {
        let global = GlobalConfig {
            default_account: Some(111),
            ..Default::default()
        };
        assert_eq!(resolve_account(Some(222), &global).unwrap(), 222);
        assert_eq!(resolve_account(None, &global).unwrap(), 111);
    }

    #[test]
    fn missing_account_is_an_error() {
        let err = resolve_account(None, &GlobalConfig::default()).unwrap_err();
        assert!(err.to_string().contains("No account specified"));
    }
}
