//! Timeouts, retries, workspace/stash options and post actions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Unit of a [`Timeout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeoutUnit {
    pub const ALL: [TimeoutUnit; 4] = [
        TimeoutUnit::Seconds,
        TimeoutUnit::Minutes,
        TimeoutUnit::Hours,
        TimeoutUnit::Days,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutUnit::Seconds => "seconds",
            TimeoutUnit::Minutes => "minutes",
            TimeoutUnit::Hours => "hours",
            TimeoutUnit::Days => "days",
        }
    }

    fn seconds(&self) -> u64 {
        match self {
            TimeoutUnit::Seconds => 1,
            TimeoutUnit::Minutes => 60,
            TimeoutUnit::Hours => 60 * 60,
            TimeoutUnit::Days => 24 * 60 * 60,
        }
    }
}

impl fmt::Display for TimeoutUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeoutUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeoutUnit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeout {
    /// Always positive
    pub time: u64,
    pub unit: TimeoutUnit,
}

impl Timeout {
    pub fn as_seconds(&self) -> u64 {
        self.time.saturating_mul(self.unit.seconds())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootOptions {
    pub timeout: Option<Timeout>,
    pub retry: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOptions {
    pub timeout: Option<Timeout>,
    pub retry: u32,

    /// Logical workspace for this stage and its descendants
    pub workspace: Option<String>,

    pub stash: Option<Stash>,
    pub unstash: Option<Unstash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stash {
    pub name: String,
    pub files: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unstash {
    pub name: String,
    pub dir: Option<String>,
}

/// When a post action fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostCondition {
    Success,
    Failure,
    Always,
}

impl PostCondition {
    pub const ALL: [PostCondition; 3] = [
        PostCondition::Success,
        PostCondition::Failure,
        PostCondition::Always,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostCondition::Success => "success",
            PostCondition::Failure => "failure",
            PostCondition::Always => "always",
        }
    }
}

impl FromStr for PostCondition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PostCondition::ALL
            .into_iter()
            .find(|condition| condition.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub condition: PostCondition,
    pub actions: Vec<PostAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAction {
    pub name: String,
    pub options: BTreeMap<String, String>,
}
