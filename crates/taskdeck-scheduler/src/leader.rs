//! Startup leadership election for multi-instance deployments.
//!
//! The decision is made exactly once, from configuration, before the
//! engine starts. There is no runtime handover: a standby stays standby
//! until restarted. Duplicate suppression does not rest on this module
//! alone; the store-level claims in [`taskdeck_store`] remain the final
//! guard even if two processes both conclude they lead.

use tracing::{info, warn};

/// Which part of the deployment this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Runs the scheduler engine.
    Leader,
    /// Serves chat traffic only; the engine stays off.
    Standby,
}

impl Role {
    pub fn is_leader(self) -> bool {
        matches!(self, Role::Leader)
    }
}

/// Decides the role of this process.
///
/// Precedence: an explicit `primary_id` pin wins; otherwise the
/// `preferred` directive (`"min"` elects the sibling with the smallest
/// numeric id suffix); otherwise single-instance operation is assumed
/// and the process leads. Whenever the configured rule cannot be
/// evaluated the process degrades to [`Role::Leader`] with a warning,
/// because a deployment with no engine at all delivers nothing.
pub fn resolve_role(
    own_id: Option<&str>,
    primary_id: Option<&str>,
    preferred: Option<&str>,
    siblings: &[String],
) -> Role {
    if let Some(primary) = primary_id {
        return match own_id {
            Some(own) if own == primary => {
                info!(instance = own, "pinned as primary instance");
                Role::Leader
            }
            Some(own) => {
                info!(instance = own, primary, "standing by, primary is pinned elsewhere");
                Role::Standby
            }
            None => {
                warn!(primary, "primary instance pinned but own instance id unknown, standing by");
                Role::Standby
            }
        };
    }

    match preferred {
        Some("min") => resolve_min(own_id, siblings),
        Some(other) => {
            warn!(directive = other, "unknown leadership directive, assuming leader");
            Role::Leader
        }
        None => {
            info!("no leadership configuration, assuming single instance");
            Role::Leader
        }
    }
}

/// `min` rule: the sibling whose id carries the smallest trailing
/// number leads. Ids without a numeric suffix are ignored; if the rule
/// cannot single anyone out we degrade to leader rather than leave the
/// deployment headless.
fn resolve_min(own_id: Option<&str>, siblings: &[String]) -> Role {
    let Some(own) = own_id else {
        warn!("min-id election requested but own instance id unknown, assuming leader");
        return Role::Leader;
    };
    let Some(own_rank) = numeric_suffix(own) else {
        warn!(instance = own, "instance id has no numeric suffix, assuming leader");
        return Role::Leader;
    };
    let Some(min_rank) = siblings.iter().filter_map(|s| numeric_suffix(s)).min() else {
        warn!(instance = own, "no siblings with numeric suffixes, assuming leader");
        return Role::Leader;
    };
    if own_rank <= min_rank {
        info!(instance = own, rank = own_rank, "elected leader by smallest instance id");
        Role::Leader
    } else {
        info!(instance = own, rank = own_rank, min_rank, "standing by, a lower instance id exists");
        Role::Standby
    }
}

/// Trailing decimal run of an instance id, e.g. `"app-12"` -> `12`.
fn numeric_suffix(id: &str) -> Option<u64> {
    let digits = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| &id[i..])?;
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pinned_primary_wins() {
        assert_eq!(
            resolve_role(Some("app-2"), Some("app-2"), Some("min"), &ids(&["app-1", "app-2"])),
            Role::Leader
        );
        assert_eq!(
            resolve_role(Some("app-1"), Some("app-2"), None, &[]),
            Role::Standby
        );
    }

    #[test]
    fn pinned_primary_with_unknown_own_id_stands_by() {
        assert_eq!(resolve_role(None, Some("app-2"), None, &[]), Role::Standby);
    }

    #[test]
    fn min_rule_elects_smallest_suffix() {
        let siblings = ids(&["app-1", "app-2", "app-3"]);
        assert_eq!(resolve_role(Some("app-1"), None, Some("min"), &siblings), Role::Leader);
        assert_eq!(resolve_role(Some("app-2"), None, Some("min"), &siblings), Role::Standby);
        assert_eq!(resolve_role(Some("app-3"), None, Some("min"), &siblings), Role::Standby);
    }

    #[test]
    fn min_rule_degrades_to_leader_when_unparseable() {
        assert_eq!(resolve_role(Some("solo"), None, Some("min"), &ids(&["solo"])), Role::Leader);
        assert_eq!(resolve_role(None, None, Some("min"), &ids(&["app-1"])), Role::Leader);
        assert_eq!(resolve_role(Some("app-1"), None, Some("min"), &[]), Role::Leader);
    }

    #[test]
    fn no_configuration_means_leader() {
        assert_eq!(resolve_role(Some("app-1"), None, None, &[]), Role::Leader);
        assert_eq!(resolve_role(None, None, None, &[]), Role::Leader);
    }

    #[test]
    fn unknown_directive_degrades_to_leader() {
        assert_eq!(resolve_role(Some("app-2"), None, Some("max"), &ids(&["app-1"])), Role::Leader);
    }

    #[test]
    fn suffix_parsing() {
        assert_eq!(numeric_suffix("app-12"), Some(12));
        assert_eq!(numeric_suffix("srv0"), Some(0));
        assert_eq!(numeric_suffix("plain"), None);
        assert_eq!(numeric_suffix(""), None);
    }
}
