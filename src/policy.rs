use std::fmt;

use chrono::TimeDelta;

use crate::config::Args;
use crate::error::ConfigError;

// One year, anything longer is a typo
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

// How many attempts an action allows per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    limit: u32,
    window_secs: u64,
}

impl RateLimitPolicy {
    pub fn new(action: &str, limit: u32, window_secs: u64) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroLimit {
                action: action.to_string(),
            });
        }
        if window_secs == 0 {
            return Err(ConfigError::ZeroWindow {
                action: action.to_string(),
            });
        }
        if window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::WindowTooLong {
                action: action.to_string(),
                seconds: window_secs,
                max: MAX_WINDOW_SECS,
            });
        }
        Ok(Self { limit, window_secs })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub fn window(&self) -> TimeDelta {
        // bounded by MAX_WINDOW_SECS, fits in i64
        TimeDelta::seconds(self.window_secs as i64)
    }
}

impl fmt::Display for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {}s", self.limit, self.window_secs)
    }
}

// Protected operations, each with its own quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SignIn,
    SignUp,
    CreateAssistant,
    CreateContract,
    Upload,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::SignIn,
        Action::SignUp,
        Action::CreateAssistant,
        Action::CreateContract,
        Action::Upload,
    ];

    // Key prefix in the limiter
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::SignIn => "signin",
            Action::SignUp => "signup",
            Action::CreateAssistant => "create-assistant",
            Action::CreateContract => "create-contract",
            Action::Upload => "upload",
        }
    }

    // Route on the gateway, forwarded to the same path upstream
    pub fn path(&self) -> &'static str {
        match self {
            Action::SignIn => "/api/auth/signin",
            Action::SignUp => "/api/auth/signup",
            Action::CreateAssistant => "/api/assistants",
            Action::CreateContract => "/api/contracts",
            Action::Upload => "/api/upload",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policies {
    pub signin: RateLimitPolicy,
    pub signup: RateLimitPolicy,
    pub create_assistant: RateLimitPolicy,
    pub create_contract: RateLimitPolicy,
    pub upload: RateLimitPolicy,
}

impl Policies {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        Ok(Self {
            signin: RateLimitPolicy::new("signin", args.signin_limit, args.signin_window)?,
            signup: RateLimitPolicy::new("signup", args.signup_limit, args.signup_window)?,
            create_assistant: RateLimitPolicy::new(
                "create-assistant",
                args.assistant_limit,
                args.assistant_window,
            )?,
            create_contract: RateLimitPolicy::new(
                "create-contract",
                args.contract_limit,
                args.contract_window,
            )?,
            upload: RateLimitPolicy::new("upload", args.upload_limit, args.upload_window)?,
        })
    }

    pub fn get(&self, action: Action) -> &RateLimitPolicy {
        match action {
            Action::SignIn => &self.signin,
            Action::SignUp => &self.signup,
            Action::CreateAssistant => &self.create_assistant,
            Action::CreateContract => &self.create_contract,
            Action::Upload => &self.upload,
        }
    }
}
