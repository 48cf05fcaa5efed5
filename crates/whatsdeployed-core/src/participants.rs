//! Role-labelled participants and their merge.
//!
//! Attribution first records every `(role, user)` sighting in the order it
//! happens, then folds them into one [`Participant`] per login. Both the
//! order of logins and the order of each login's roles are first-encounter.

use std::collections::HashMap;

use serde::{Serialize, Serializer};

use crate::forge::ForgeUser;

/// Separator used when rendering several roles as one label.
pub const LABEL_SEPARATOR: &str = " & ";

/// Why someone is attributed to a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Author,
    Committer,
    Assignee,
    Commenter,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Role::Author => "Author",
            Role::Committer => "Committer",
            Role::Assignee => "Assignee",
            Role::Commenter => "Commenter",
        };
        f.write_str(label)
    }
}

/// One person and every role they were seen in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user: ForgeUser,
    pub roles: Vec<Role>,
}

impl Participant {
    pub fn login(&self) -> &str {
        &self.user.login
    }

    /// Roles joined for display, e.g. `"Author & Commenter"`.
    pub fn label(&self) -> String {
        self.roles
            .iter()
            .map(Role::to_string)
            .collect::<Vec<_>>()
            .join(LABEL_SEPARATOR)
    }
}

#[derive(Serialize)]
struct ParticipantView<'a> {
    login: &'a str,
    label: String,
    roles: &'a [Role],
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_url: Option<&'a str>,
}

impl Serialize for Participant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ParticipantView {
            login: &self.user.login,
            label: self.label(),
            roles: &self.roles,
            avatar_url: self.user.avatar_url.as_deref(),
            html_url: self.user.html_url.as_deref(),
        }
        .serialize(serializer)
    }
}

/// Ordered log of `(role, user)` sightings for one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sightings {
    entries: Vec<(Role, ForgeUser)>,
}

impl Sightings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, user: ForgeUser) {
        self.entries.push((role, user));
    }

    /// Append unless this exact `(role, user)` pair was already recorded.
    ///
    /// The check happens at append time, so it can change which role a login
    /// shows first when two user objects share a login but differ otherwise.
    pub fn push_unless_present(&mut self, role: Role, user: ForgeUser) {
        if !self.contains(role, &user) {
            self.entries.push((role, user));
        }
    }

    pub fn contains(&self, role: Role, user: &ForgeUser) -> bool {
        self.entries.iter().any(|(r, u)| *r == role && u == user)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold sightings into one participant per login.
    ///
    /// Keeps the first user object seen for a login and the first-encounter
    /// order of both logins and roles; repeated roles collapse.
    pub fn merge(self) -> Vec<Participant> {
        let mut participants: Vec<Participant> = Vec::new();
        let mut by_login: HashMap<String, usize> = HashMap::new();

        for (role, user) in self.entries {
            match by_login.get(&user.login) {
                Some(&idx) => {
                    let roles = &mut participants[idx].roles;
                    if !roles.contains(&role) {
                        roles.push(role);
                    }
                }
                None => {
                    by_login.insert(user.login.clone(), participants.len());
                    participants.push(Participant {
                        user,
                        roles: vec![role],
                    });
                }
            }
        }

        participants
    }
}
