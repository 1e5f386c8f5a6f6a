//! Which status reports to fetch.

use clap::ValueEnum;

/// The `--status` choice on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StatusSelection {
    #[default]
    All,
    Leader,
    Peers,
    #[value(name = "self")]
    AgentSelf,
}

/// Set of status reports, in the fixed order leader, peers, self.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub leader: bool,
    pub peers: bool,
    pub agent_self: bool,
}

impl StatusFlags {
    pub const ALL: StatusFlags = StatusFlags {
        leader: true,
        peers: true,
        agent_self: true,
    };

    pub fn is_empty(&self) -> bool {
        !(self.leader || self.peers || self.agent_self)
    }

    /// Add the reports named by `selection`.
    pub fn insert(&mut self, selection: StatusSelection) {
        match selection {
            StatusSelection::All => *self = StatusFlags::ALL,
            StatusSelection::Leader => self.leader = true,
            StatusSelection::Peers => self.peers = true,
            StatusSelection::AgentSelf => self.agent_self = true,
        }
    }
}

impl From<StatusSelection> for StatusFlags {
    fn from(selection: StatusSelection) -> Self {
        let mut flags = StatusFlags::default();
        flags.insert(selection);
        flags
    }
}

impl FromIterator<StatusSelection> for StatusFlags {
    fn from_iter<I: IntoIterator<Item = StatusSelection>>(iter: I) -> Self {
        let mut flags = StatusFlags::default();
        for selection in iter {
            flags.insert(selection);
        }
        flags
    }
}
