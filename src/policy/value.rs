use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::ValueError;

/// Milliseconds per day, the unit the delay presets and the legacy duration
/// map are expressed in.
pub const DAY_MS: u64 = 86_400_000;

/// Raw storage sentinel for "defer to the universal policy".
pub const RAW_UNIVERSAL: i64 = -1;

/// Raw storage sentinel for "no cap" (forever for delay, unlimited for length).
pub const RAW_UNBOUNDED: i64 = i64::MAX;

// ─── Policy kinds ────────────────────────────────────────────────────────────

/// The two mirrored retention axes. Everything downstream (resolver,
/// comparator, controller) is parameterized over this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PolicyKind {
    /// Time-based retention: how long a message is kept after it was sent.
    Delay,
    /// Count-based retention: how many messages a conversation keeps.
    Length,
}

impl PolicyKind {
    pub const ALL: [Self; 2] = [Self::Delay, Self::Length];

    /// Human label for the unbounded value of this kind.
    #[must_use]
    pub const fn unbounded_label(self) -> &'static str {
        match self {
            Self::Delay => "forever",
            Self::Length => "unlimited",
        }
    }
}

// ─── Stored / candidate values ───────────────────────────────────────────────

/// A retention value as stored or proposed: the universal sentinel, the
/// unbounded sentinel, or a concrete cap (milliseconds for delay, message
/// count for length).
///
/// `Universal` is only meaningful on a per-conversation override; the global
/// value is typed [`EffectiveValue`] so the sentinel cannot be stored there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionValue {
    Universal,
    Unbounded,
    Limited(u64),
}

impl RetentionValue {
    /// Validated delay candidate from a raw millisecond count. Zero is a
    /// legal delay (trim everything already sent); negative is not.
    pub fn delay_ms(ms: i64) -> Result<Self, ValueError> {
        match ms {
            RAW_UNBOUNDED => Ok(Self::Unbounded),
            n if n < 0 => Err(ValueError::NegativeDelay(n)),
            n => Ok(Self::Limited(n as u64)),
        }
    }

    /// Validated length candidate from a message count. A conversation must
    /// keep at least one message, so zero and negative counts are rejected.
    pub fn length(count: i64) -> Result<Self, ValueError> {
        match count {
            RAW_UNBOUNDED => Ok(Self::Unbounded),
            n if n <= 0 => Err(ValueError::ZeroLength),
            n => Ok(Self::Limited(n as u64)),
        }
    }

    /// Decodes the storage representation: `-1` universal, `i64::MAX`
    /// unbounded, any other non-negative value a concrete cap.
    pub fn from_raw(raw: i64) -> Result<Self, ValueError> {
        match raw {
            RAW_UNIVERSAL => Ok(Self::Universal),
            RAW_UNBOUNDED => Ok(Self::Unbounded),
            n if n >= 0 => Ok(Self::Limited(n as u64)),
            n => Err(ValueError::UnknownRaw(n)),
        }
    }

    #[must_use]
    pub const fn to_raw(self) -> i64 {
        match self {
            Self::Universal => RAW_UNIVERSAL,
            Self::Unbounded => RAW_UNBOUNDED,
            Self::Limited(n) => n as i64,
        }
    }

    /// Boundary validation for a candidate of the given kind, applied before
    /// any value reaches the comparator or a store write.
    pub fn validate_for(self, kind: PolicyKind) -> Result<Self, ValueError> {
        match self {
            Self::Limited(n) if n >= RAW_UNBOUNDED as u64 => Err(ValueError::OutOfRange(n)),
            Self::Limited(0) if kind == PolicyKind::Length => Err(ValueError::ZeroLength),
            other => Ok(other),
        }
    }

    #[must_use]
    pub const fn is_universal(self) -> bool {
        matches!(self, Self::Universal)
    }

    #[must_use]
    pub const fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Collapses the universal sentinel against a known universal value.
    #[must_use]
    pub const fn resolve_with(self, universal: EffectiveValue) -> EffectiveValue {
        match self {
            Self::Universal => universal,
            Self::Unbounded => EffectiveValue::Unbounded,
            Self::Limited(n) => EffectiveValue::Limited(n),
        }
    }

    /// Kind-aware human label ("universal", "forever"/"unlimited", or the cap).
    #[must_use]
    pub fn label_for(self, kind: PolicyKind) -> String {
        match self {
            Self::Universal => "universal".to_string(),
            Self::Unbounded => kind.unbounded_label().to_string(),
            Self::Limited(n) => match kind {
                PolicyKind::Delay => format_delay_ms(n),
                PolicyKind::Length => format!("{n} messages"),
            },
        }
    }
}

impl std::fmt::Display for RetentionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Universal => write!(f, "universal"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::Limited(n) => write!(f, "{n}"),
        }
    }
}

impl From<EffectiveValue> for RetentionValue {
    fn from(value: EffectiveValue) -> Self {
        match value {
            EffectiveValue::Limited(n) => Self::Limited(n),
            EffectiveValue::Unbounded => Self::Unbounded,
        }
    }
}

// ─── Resolved values ─────────────────────────────────────────────────────────

/// A retention value after sentinel resolution: what actually governs
/// trimming. The derived ordering is the restrictiveness order, a smaller
/// value retains less and `Unbounded` retains the most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveValue {
    Limited(u64),
    Unbounded,
}

impl EffectiveValue {
    /// Decodes the storage representation of a global value. The universal
    /// sentinel is not legal here: the global policy must always resolve to
    /// a concrete cap or the unbounded marker.
    pub fn from_raw(raw: i64) -> Result<Self, ValueError> {
        match raw {
            RAW_UNBOUNDED => Ok(Self::Unbounded),
            n if n >= 0 => Ok(Self::Limited(n as u64)),
            n => Err(ValueError::UnknownRaw(n)),
        }
    }

    #[must_use]
    pub const fn to_raw(self) -> i64 {
        match self {
            Self::Unbounded => RAW_UNBOUNDED,
            Self::Limited(n) => n as i64,
        }
    }

    #[must_use]
    pub const fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// The concrete cap, if any. `None` means no trimming on this axis.
    #[must_use]
    pub const fn cap(self) -> Option<u64> {
        match self {
            Self::Limited(n) => Some(n),
            Self::Unbounded => None,
        }
    }

    #[must_use]
    pub fn label_for(self, kind: PolicyKind) -> String {
        RetentionValue::from(self).label_for(kind)
    }
}

impl std::fmt::Display for EffectiveValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Limited(n) => write!(f, "{n}"),
        }
    }
}

/// Renders a delay in whole days where it divides evenly, raw milliseconds
/// otherwise.
#[must_use]
pub fn format_delay_ms(ms: u64) -> String {
    if ms > 0 && ms % DAY_MS == 0 {
        let days = ms / DAY_MS;
        if days == 1 {
            "1 day".to_string()
        } else {
            format!("{days} days")
        }
    } else {
        format!("{ms} ms")
    }
}
