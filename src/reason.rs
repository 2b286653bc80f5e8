use serde::{Deserialize, Serialize};

/// Describes why a flag evaluated to its value. Attached to feature events and to the flags
/// state when evaluation reasons were requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationReason {
    /// The flag is off and returned its off variation.
    Off,
    /// No targets or rules matched; the fallthrough variation was used.
    Fallthrough,
    /// The user key was individually targeted.
    TargetMatch,
    /// The user matched one of the flag's rules.
    #[serde(rename_all = "camelCase")]
    RuleMatch {
        /// Index of the matched rule.
        rule_index: usize,
        /// Identifier of the matched rule.
        rule_id: String,
    },
    /// A prerequisite flag was off or did not return the required variation.
    #[serde(rename_all = "camelCase")]
    PrerequisiteFailed {
        /// Key of the first prerequisite that failed.
        prerequisite_key: String,
    },
    /// The flag could not be evaluated.
    #[serde(rename_all = "camelCase")]
    Error {
        /// What went wrong.
        error_kind: EvaluationErrorKind,
    },
}

/// Category of an evaluation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum EvaluationErrorKind {
    ClientNotReady,
    FlagNotFound,
    MalformedFlag,
    UserNotSpecified,
    WrongType,
    Exception,
}
