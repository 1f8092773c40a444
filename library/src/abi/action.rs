use std::ffi::CStr;
use std::fmt;

use super::ffi::{self, FxStatus};

/// Actions the host sends through a plugin's main entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Action {
    Load,
    Describe,
    DescribeInContext,
    CreateInstance,
    DestroyInstance,
    GetRegionOfDefinition,
    GetTimeDomain,
    BeginSequenceRender,
    Render,
    EndSequenceRender,
    Unload,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::Load,
        Action::Describe,
        Action::DescribeInContext,
        Action::CreateInstance,
        Action::DestroyInstance,
        Action::GetRegionOfDefinition,
        Action::GetTimeDomain,
        Action::BeginSequenceRender,
        Action::Render,
        Action::EndSequenceRender,
        Action::Unload,
    ];

    pub fn c_name(self) -> &'static CStr {
        match self {
            Action::Load => c"fx.action.load",
            Action::Describe => c"fx.action.describe",
            Action::DescribeInContext => c"fx.action.describeInContext",
            Action::CreateInstance => c"fx.action.createInstance",
            Action::DestroyInstance => c"fx.action.destroyInstance",
            Action::GetRegionOfDefinition => c"fx.action.getRegionOfDefinition",
            Action::GetTimeDomain => c"fx.action.getTimeDomain",
            Action::BeginSequenceRender => c"fx.action.beginSequenceRender",
            Action::Render => c"fx.action.render",
            Action::EndSequenceRender => c"fx.action.endSequenceRender",
            Action::Unload => c"fx.action.unload",
        }
    }

    pub fn name(self) -> &'static str {
        self.c_name().to_str().unwrap_or_default()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed view of an [`FxStatus`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Status {
    Ok,
    Failed,
    ErrFatal,
    ErrUnknown,
    ErrMissingHostFeature,
    ErrUnsupported,
    ErrExists,
    ErrFormat,
    ErrMemory,
    ErrBadHandle,
    ErrBadIndex,
    ErrValue,
    ReplyYes,
    ReplyNo,
    ReplyDefault,
    Other(FxStatus),
}

impl Status {
    pub fn from_raw(code: FxStatus) -> Self {
        match code {
            ffi::STAT_OK => Status::Ok,
            ffi::STAT_FAILED => Status::Failed,
            ffi::STAT_ERR_FATAL => Status::ErrFatal,
            ffi::STAT_ERR_UNKNOWN => Status::ErrUnknown,
            ffi::STAT_ERR_MISSING_HOST_FEATURE => Status::ErrMissingHostFeature,
            ffi::STAT_ERR_UNSUPPORTED => Status::ErrUnsupported,
            ffi::STAT_ERR_EXISTS => Status::ErrExists,
            ffi::STAT_ERR_FORMAT => Status::ErrFormat,
            ffi::STAT_ERR_MEMORY => Status::ErrMemory,
            ffi::STAT_ERR_BAD_HANDLE => Status::ErrBadHandle,
            ffi::STAT_ERR_BAD_INDEX => Status::ErrBadIndex,
            ffi::STAT_ERR_VALUE => Status::ErrValue,
            ffi::STAT_REPLY_YES => Status::ReplyYes,
            ffi::STAT_REPLY_NO => Status::ReplyNo,
            ffi::STAT_REPLY_DEFAULT => Status::ReplyDefault,
            other => Status::Other(other),
        }
    }

    pub fn to_raw(self) -> FxStatus {
        match self {
            Status::Ok => ffi::STAT_OK,
            Status::Failed => ffi::STAT_FAILED,
            Status::ErrFatal => ffi::STAT_ERR_FATAL,
            Status::ErrUnknown => ffi::STAT_ERR_UNKNOWN,
            Status::ErrMissingHostFeature => ffi::STAT_ERR_MISSING_HOST_FEATURE,
            Status::ErrUnsupported => ffi::STAT_ERR_UNSUPPORTED,
            Status::ErrExists => ffi::STAT_ERR_EXISTS,
            Status::ErrFormat => ffi::STAT_ERR_FORMAT,
            Status::ErrMemory => ffi::STAT_ERR_MEMORY,
            Status::ErrBadHandle => ffi::STAT_ERR_BAD_HANDLE,
            Status::ErrBadIndex => ffi::STAT_ERR_BAD_INDEX,
            Status::ErrValue => ffi::STAT_ERR_VALUE,
            Status::ReplyYes => ffi::STAT_REPLY_YES,
            Status::ReplyNo => ffi::STAT_REPLY_NO,
            Status::ReplyDefault => ffi::STAT_REPLY_DEFAULT,
            Status::Other(code) => code,
        }
    }

    /// OK and ReplyDefault both mean the action completed.
    pub fn is_success(self) -> bool {
        matches!(self, Status::Ok | Status::ReplyDefault)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Other(code) => write!(f, "status {}", code),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_name(action.name()), Some(action));
        }
        assert_eq!(Action::from_name("fx.action.purge"), None);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::from_raw(14), Status::ReplyDefault);
        assert_eq!(Status::ErrBadIndex.to_raw(), 10);
        assert_eq!(Status::from_raw(99), Status::Other(99));
        assert!(Status::ReplyDefault.is_success());
        assert!(!Status::Failed.is_success());
    }
}
