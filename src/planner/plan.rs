//! Plan type.
//!
//! A plan is the ordered sequence of commands that moves the current module
//! set towards the desired one. Plans compare by the kind, module and
//! description of each command, in order.

use chrono::{DateTime, Utc};

use crate::command::{CommandKind, CommandRef};

/// An ordered sequence of commands.
#[derive(Debug, Clone)]
pub struct Plan {
    /// When the plan was produced.
    created_at: Option<DateTime<Utc>>,
    /// Commands in execution order.
    commands: Vec<CommandRef>,
}

impl Plan {
    /// The plan that changes nothing.
    pub const EMPTY: Self = Self {
        created_at: None,
        commands: Vec::new(),
    };

    /// Creates a plan from commands in execution order.
    ///
    /// An empty command list yields [`Plan::EMPTY`].
    #[must_use]
    pub fn new(commands: Vec<CommandRef>) -> Self {
        if commands.is_empty() {
            return Self::EMPTY;
        }
        Self {
            created_at: Some(Utc::now()),
            commands,
        }
    }

    /// Returns the plan that changes nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    /// Commands in execution order.
    #[must_use]
    pub fn commands(&self) -> &[CommandRef] {
        &self.commands
    }

    /// Returns true if the plan has no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns the number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// When the plan was produced. `None` for the empty plan.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Number of commands of the given kind.
    #[must_use]
    pub fn count_of(&self, kind: CommandKind) -> usize {
        self.commands.iter().filter(|c| c.kind() == kind).count()
    }

    /// Names of the modules touched, in plan order, without repeats.
    #[must_use]
    pub fn modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.commands.len());
        for cmd in &self.commands {
            if !names.contains(&cmd.module()) {
                names.push(cmd.module());
            }
        }
        names
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for Plan {
    fn eq(&self, other: &Self) -> bool {
        self.commands.len() == other.commands.len()
            && self.commands.iter().zip(&other.commands).all(|(a, b)| {
                a.kind() == b.kind() && a.module() == b.module() && a.show() == b.show()
            })
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.commands.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Plan ({} commands):", self.commands.len())?;
        for (i, cmd) in self.commands.iter().enumerate() {
            writeln!(f, "  {i}. [{}] {}", cmd.kind(), cmd.show())?;
        }
        Ok(())
    }
}
