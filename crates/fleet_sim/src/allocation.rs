use crate::agent::{Agent, AgentId, ItemId};
use crate::geometry::Polygon;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who takes part in the tessellation.
///
/// Both policies only ever assign to idle agents; they differ in whether
/// busy agents still carve out cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationPolicy {
    /// Only idle agents are sites. The arena is shared among whoever is free.
    #[default]
    Restricted,
    /// Every agent is a site. An item in a busy agent's cell waits, and is
    /// retried while the scanner still sees it.
    Unrestricted,
}

impl AllocationPolicy {
    pub fn is_site(&self, agent: &Agent) -> bool {
        match self {
            AllocationPolicy::Restricted => agent.is_idle(),
            AllocationPolicy::Unrestricted => true,
        }
    }

    /// Whether detected-but-unassigned items in sensor range are offered
    /// again on later ticks.
    pub fn retries_pending(&self) -> bool {
        matches!(self, AllocationPolicy::Unrestricted)
    }
}

impl fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationPolicy::Restricted => f.write_str("restricted"),
            AllocationPolicy::Unrestricted => f.write_str("unrestricted"),
        }
    }
}

/// Frozen per-agent input to the allocator.
#[derive(Debug, Clone, Copy)]
pub struct SiteView<'a> {
    pub id: AgentId,
    pub idle: bool,
    pub cell: Option<&'a Polygon>,
}

impl<'a> SiteView<'a> {
    pub fn of(agent: &'a Agent) -> Self {
        Self {
            id: agent.id,
            idle: agent.is_idle(),
            cell: agent.cell.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub id: ItemId,
    pub position: DVec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub agent: AgentId,
    pub item: ItemId,
}

/// First-match allocation.
///
/// Candidates are visited in the given order and, for each, the sites in the
/// given order. The first idle site whose cell contains the item gets it.
/// Each site is matched at most once per call and each candidate at most
/// once.
pub fn allocate(sites: &[SiteView<'_>], candidates: &[Candidate]) -> Vec<Assignment> {
    let mut taken = vec![false; sites.len()];
    let mut out = Vec::new();

    for item in candidates {
        let winner = sites.iter().enumerate().find(|(idx, site)| {
            site.idle
                && !taken[*idx]
                && site.cell.is_some_and(|cell| cell.contains(item.position))
        });
        if let Some((idx, site)) = winner {
            taken[idx] = true;
            out.push(Assignment {
                agent: site.id,
                item: item.id,
            });
        }
    }
    out
}
