use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::ids::{ScheduleId, UserId};
use crate::invite::InviteCode;

/// Account type chosen at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// Owns a medicine schedule and an invite code.
    Primary,
    /// Joins a primary's group and lands in its caregivers list.
    Caregiver,
    /// Joins a primary's group and lands in its elders list.
    Elder,
}

impl UserType {
    /// The list on the primary's record this type joins, if any.
    pub fn member_role(&self) -> Option<MemberRole> {
        match self {
            UserType::Primary => None,
            UserType::Caregiver => Some(MemberRole::Caregivers),
            UserType::Elder => Some(MemberRole::Elders),
        }
    }

    /// Secondary types must present an invite code.
    pub fn requires_link_code(&self) -> bool {
        self.member_role().is_some()
    }

    /// Display label used in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            UserType::Primary => "Primary",
            UserType::Caregiver => "Caregiver",
            UserType::Elder => "Elder",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Primary => write!(f, "primary"),
            UserType::Caregiver => write!(f, "caregiver"),
            UserType::Elder => write!(f, "elder"),
        }
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "adminly" => Ok(UserType::Primary),
            "caregiver" => Ok(UserType::Caregiver),
            "elder" => Ok(UserType::Elder),
            _ => Err(format!(
                "Invalid user type '{}'. Valid options: primary, caregiver, elder",
                s
            )),
        }
    }
}

/// Which of a primary's member lists a secondary user belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Caregivers,
    Elders,
}

impl MemberRole {
    /// Field name of the list on the primary's record.
    pub fn field(&self) -> &'static str {
        match self {
            MemberRole::Caregivers => "caregivers",
            MemberRole::Elders => "elders",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "caregivers" => Ok(MemberRole::Caregivers),
            "elders" => Ok(MemberRole::Elders),
            _ => Err(format!("Invalid member role '{}'", s)),
        }
    }
}

/// Linked users of a primary, split by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    pub caregivers: BTreeSet<UserId>,
    pub elders: BTreeSet<UserId>,
}

impl Members {
    pub fn list(&self, role: MemberRole) -> &BTreeSet<UserId> {
        match role {
            MemberRole::Caregivers => &self.caregivers,
            MemberRole::Elders => &self.elders,
        }
    }

    /// Adds a member unless already present. Returns true if it was added.
    pub fn add(&mut self, role: MemberRole, member: UserId) -> bool {
        match role {
            MemberRole::Caregivers => self.caregivers.insert(member),
            MemberRole::Elders => self.elders.insert(member),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.caregivers.is_empty() && self.elders.is_empty()
    }
}

/// A stored user record.
///
/// Primary records own their `link_code` and `medicine_schedule_id` and carry
/// member lists; secondary records copy both values from their primary and
/// carry no member lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    pub link_code: InviteCode,
    pub medicine_schedule_id: ScheduleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Members>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// A new primary record with empty member lists.
    pub fn primary(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        link_code: InviteCode,
        medicine_schedule_id: ScheduleId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            user_type: UserType::Primary,
            link_code,
            medicine_schedule_id,
            members: Some(Members::default()),
            created_at: Utc::now(),
        }
    }

    /// A new secondary record sharing the primary's code and schedule.
    pub fn secondary(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        user_type: UserType,
        primary: &UserRecord,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            user_type,
            link_code: primary.link_code.clone(),
            medicine_schedule_id: primary.medicine_schedule_id.clone(),
            members: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.user_type == UserType::Primary
    }
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len()))?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Email: {}", self.email)?;
        writeln!(f, "Type: {}", self.user_type)?;
        writeln!(f, "Invite code: {}", self.link_code)?;
        writeln!(f, "Medicine schedule: {}", self.medicine_schedule_id)?;

        if let Some(members) = &self.members {
            for role in [MemberRole::Caregivers, MemberRole::Elders] {
                let list = members.list(role);
                if list.is_empty() {
                    writeln!(f, "{}: none", role)?;
                } else {
                    writeln!(f, "{}:", role)?;
                    for id in list {
                        writeln!(f, "  - {}", id)?;
                    }
                }
            }
        }

        write!(f, "Created: {}", self.created_at.format("%Y-%m-%d %H:%M"))
    }
}
