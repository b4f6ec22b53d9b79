use std::sync::LazyLock;

use aws_config::{
    retry::RetryConfig,
    BehaviorVersion,
    ConfigLoader,
};
use aws_types::region::Region;
use cmd_util::env::env_config_opt;

pub mod cloudwatch;

/// Overrides the CloudWatch endpoint, e.g. to point at a local emulator.
static CLOUDWATCH_ENDPOINT_URL: LazyLock<Option<String>> =
    LazyLock::new(|| env_config_opt("CLOUDWATCH_ENDPOINT_URL"));

pub const DEFAULT_PROFILE: &str = "default";

/// The shared-config profile to select for `profile`, or `None` when the
/// default credential chain should be used.
pub fn named_profile(profile: &str) -> Option<&str> {
    match profile {
        "" | DEFAULT_PROFILE => None,
        name => Some(name),
    }
}

/// Like `aws_config::from_env` but pinned to `region` and, unless `profile`
/// is "default", to the named profile from the shared config files.
///
/// SDK-level retries are disabled: callers run their own backoff so that
/// every attempt is visible to them.
pub fn config_loader_for_profile(profile: &str, region: &str) -> ConfigLoader {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_owned()))
        .retry_config(RetryConfig::disabled());
    if let Some(name) = named_profile(profile) {
        loader = loader.profile_name(name);
    }
    loader
}
