//! TicketHierarchy — create/get/list at each level of the three-level
//! ticket tree, plus status propagation.
//!
//! IDs are positional: parent `<project>-NNNN`, child `<parent>-NN`,
//! grandchild `<child>-NNN`. Level is derived from the digit-lengths of
//! the trailing dash-separated segments, not carried as a separate field.

use crate::state_store::StateStore;
use agentyard_core::ticket::{
    derive_parent_status, ChildTicket, GrandchildTicket, ParentTicket, TicketStatus, TicketTree,
    WorkerType,
};
use agentyard_core::{Error, Result, TicketId};
use chrono::Utc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TicketLevel {
    Parent,
    Child,
    Grandchild,
}

/// Classifies an id by the digit-length shape of its trailing segments:
/// `NNNN` ⇒ parent, `NNNN-NN` ⇒ child, `NNNN-NN-NNN` ⇒ grandchild.
pub fn ticket_level(id: &str) -> Option<TicketLevel> {
    let segments: Vec<&str> = id.split('-').collect();
    let is_digits = |s: &str, len: usize| s.len() == len && s.chars().all(|c| c.is_ascii_digit());

    if segments.len() >= 4
        && is_digits(segments[segments.len() - 1], 3)
        && is_digits(segments[segments.len() - 2], 2)
        && is_digits(segments[segments.len() - 3], 4)
    {
        return Some(TicketLevel::Grandchild);
    }
    if segments.len() >= 3
        && is_digits(segments[segments.len() - 1], 2)
        && is_digits(segments[segments.len() - 2], 4)
    {
        return Some(TicketLevel::Child);
    }
    if segments.len() >= 2 && is_digits(segments[segments.len() - 1], 4) {
        return Some(TicketLevel::Parent);
    }
    None
}

fn next_sequence(existing: &[&str], width: usize) -> String {
    let max = existing
        .iter()
        .filter_map(|s| s.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{:0width$}", max + 1, width = width)
}

#[derive(Clone)]
pub struct TicketHierarchy {
    store: StateStore,
}

impl TicketHierarchy {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    async fn load_tree_or_new(&self, project_id: &str) -> Result<TicketTree> {
        Ok(self.store.load_ticket_tree(project_id).await?.unwrap_or_else(|| TicketTree {
            project_id: project_id.to_string(),
            parent_tickets: Vec::new(),
            last_updated: Utc::now(),
        }))
    }

    async fn save(&self, mut tree: TicketTree) -> Result<()> {
        tree.last_updated = Utc::now();
        self.store.save_ticket_tree(&tree).await
    }

    /// Creates a `ParentTicket`. Validators: non-empty project id,
    /// instruction, title.
    pub async fn create_parent(
        &self,
        project_id: &str,
        instruction: &str,
        title: &str,
    ) -> Result<ParentTicket> {
        if project_id.trim().is_empty() {
            return Err(Error::invalid_input("project id must be non-empty"));
        }
        if instruction.trim().is_empty() {
            return Err(Error::invalid_input("instruction must be non-empty"));
        }
        if title.trim().is_empty() {
            return Err(Error::invalid_input("title must be non-empty"));
        }

        let mut tree = self.load_tree_or_new(project_id).await?;
        let existing: Vec<&str> = tree
            .parent_tickets
            .iter()
            .filter_map(|p| p.id.as_str().rsplit('-').next())
            .collect();
        let seq = next_sequence(&existing, 4);
        let now = Utc::now();
        let ticket = ParentTicket {
            id: TicketId::new(format!("{}-{}", project_id, seq)),
            title: title.to_string(),
            instruction: instruction.to_string(),
            status: TicketStatus::Pending,
            children: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tree.parent_tickets.push(ticket.clone());
        self.save(tree).await?;
        Ok(ticket)
    }

    /// Creates a `ChildTicket` under `parent_id`. Validators: non-empty
    /// title, valid `workerType`.
    pub async fn create_child(
        &self,
        project_id: &str,
        parent_id: &str,
        title: &str,
        worker_type: WorkerType,
    ) -> Result<ChildTicket> {
        if title.trim().is_empty() {
            return Err(Error::invalid_input("title must be non-empty"));
        }

        let mut tree = self.load_tree_or_new(project_id).await?;
        let parent = tree
            .parent_tickets
            .iter_mut()
            .find(|p| p.id.as_str() == parent_id)
            .ok_or_else(|| Error::not_found(format!("parent ticket {} not found", parent_id)))?;

        let existing: Vec<&str> = parent
            .children
            .iter()
            .filter_map(|c| c.id.as_str().rsplit('-').next())
            .collect();
        let seq = next_sequence(&existing, 2);
        let now = Utc::now();
        let ticket = ChildTicket {
            id: TicketId::new(format!("{}-{}", parent_id, seq)),
            title: title.to_string(),
            status: TicketStatus::Pending,
            worker_type,
            children: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        parent.children.push(ticket.clone());
        self.save(tree).await?;
        Ok(ticket)
    }

    /// Creates a `GrandchildTicket` under `child_id`.
    pub async fn create_grandchild(
        &self,
        project_id: &str,
        child_id: &str,
        title: &str,
        acceptance_criteria: Vec<String>,
    ) -> Result<GrandchildTicket> {
        if title.trim().is_empty() {
            return Err(Error::invalid_input("title must be non-empty"));
        }

        let mut tree = self.load_tree_or_new(project_id).await?;
        let child = tree
            .parent_tickets
            .iter_mut()
            .flat_map(|p| p.children.iter_mut())
            .find(|c| c.id.as_str() == child_id)
            .ok_or_else(|| Error::not_found(format!("child ticket {} not found", child_id)))?;

        let existing: Vec<&str> = child
            .children
            .iter()
            .filter_map(|g| g.id.as_str().rsplit('-').next())
            .collect();
        let seq = next_sequence(&existing, 3);
        let now = Utc::now();
        let ticket = GrandchildTicket {
            id: TicketId::new(format!("{}-{}", child_id, seq)),
            title: title.to_string(),
            status: TicketStatus::Pending,
            acceptance_criteria,
            assignee: None,
            git_branch: None,
            artifacts: Vec::new(),
            review_result: None,
            created_at: now,
            updated_at: now,
        };
        child.children.push(ticket.clone());
        self.save(tree).await?;
        Ok(ticket)
    }

    pub async fn get_parent(&self, project_id: &str, id: &str) -> Result<Option<ParentTicket>> {
        let tree = self.load_tree_or_new(project_id).await?;
        Ok(tree.parent_tickets.into_iter().find(|p| p.id.as_str() == id))
    }

    pub async fn get_child(&self, project_id: &str, id: &str) -> Result<Option<ChildTicket>> {
        let tree = self.load_tree_or_new(project_id).await?;
        Ok(tree
            .parent_tickets
            .into_iter()
            .flat_map(|p| p.children)
            .find(|c| c.id.as_str() == id))
    }

    pub async fn get_grandchild(&self, project_id: &str, id: &str) -> Result<Option<GrandchildTicket>> {
        let tree = self.load_tree_or_new(project_id).await?;
        Ok(tree
            .parent_tickets
            .into_iter()
            .flat_map(|p| p.children)
            .flat_map(|c| c.children)
            .find(|g| g.id.as_str() == id))
    }

    pub async fn list_parents(&self, project_id: &str) -> Result<Vec<ParentTicket>> {
        Ok(self.load_tree_or_new(project_id).await?.parent_tickets)
    }

    pub async fn list_children(&self, project_id: &str, parent_id: &str) -> Result<Vec<ChildTicket>> {
        let tree = self.load_tree_or_new(project_id).await?;
        Ok(tree
            .parent_tickets
            .into_iter()
            .find(|p| p.id.as_str() == parent_id)
            .map(|p| p.children)
            .unwrap_or_default())
    }

    pub async fn list_grandchildren(&self, project_id: &str, child_id: &str) -> Result<Vec<GrandchildTicket>> {
        let tree = self.load_tree_or_new(project_id).await?;
        Ok(tree
            .parent_tickets
            .into_iter()
            .flat_map(|p| p.children)
            .find(|c| c.id.as_str() == child_id)
            .map(|c| c.children)
            .unwrap_or_default())
    }

    /// `updateTicketStatus` — locates the node by id shape and sets its
    /// status directly (propagation is a separate, explicit step).
    pub async fn update_ticket_status(&self, project_id: &str, id: &str, status: TicketStatus) -> Result<()> {
        let level = ticket_level(id).ok_or_else(|| Error::invalid_input(format!("unrecognized ticket id shape: {}", id)))?;
        let mut tree = self.load_tree_or_new(project_id).await?;
        let now = Utc::now();

        let found = match level {
            TicketLevel::Parent => tree.parent_tickets.iter_mut().find(|p| p.id.as_str() == id).map(|p| {
                p.status = status;
                p.updated_at = now;
            }),
            TicketLevel::Child => tree
                .parent_tickets
                .iter_mut()
                .flat_map(|p| p.children.iter_mut())
                .find(|c| c.id.as_str() == id)
                .map(|c| {
                    c.status = status;
                    c.updated_at = now;
                }),
            TicketLevel::Grandchild => tree
                .parent_tickets
                .iter_mut()
                .flat_map(|p| p.children.iter_mut())
                .flat_map(|c| c.children.iter_mut())
                .find(|g| g.id.as_str() == id)
                .map(|g| {
                    g.status = status;
                    g.updated_at = now;
                }),
        };

        if found.is_none() {
            return Err(Error::not_found(format!("ticket {} not found", id)));
        }
        self.save(tree).await
    }

    /// `propagateStatusToParent` — applies `derive_parent_status` and
    /// recurses upward until a propagation produces no change. `id` may be
    /// a grandchild or a child; propagating from a parent is a no-op
    /// (nothing above it).
    pub async fn propagate_status_to_parent(&self, project_id: &str, id: &str) -> Result<()> {
        let level = ticket_level(id).ok_or_else(|| Error::invalid_input(format!("unrecognized ticket id shape: {}", id)))?;
        if level == TicketLevel::Parent {
            return Ok(());
        }

        let mut tree = self.load_tree_or_new(project_id).await?;
        let now = Utc::now();
        let mut changed_parent_id: Option<String> = None;

        match level {
            TicketLevel::Grandchild => {
                for parent in tree.parent_tickets.iter_mut() {
                    for child in parent.children.iter_mut() {
                        if child.children.iter().any(|g| g.id.as_str() == id) {
                            let statuses: Vec<TicketStatus> = child.children.iter().map(|g| g.status).collect();
                            if let Some(new_status) = derive_parent_status(&statuses) {
                                if new_status != child.status {
                                    child.status = new_status;
                                    child.updated_at = now;
                                    changed_parent_id = Some(child.id.as_str().to_string());
                                }
                            }
                        }
                    }
                }
            }
            TicketLevel::Child => {
                for parent in tree.parent_tickets.iter_mut() {
                    if parent.children.iter().any(|c| c.id.as_str() == id) {
                        let statuses: Vec<TicketStatus> = parent.children.iter().map(|c| c.status).collect();
                        if let Some(new_status) = derive_parent_status(&statuses) {
                            if new_status != parent.status {
                                parent.status = new_status;
                                parent.updated_at = now;
                                changed_parent_id = Some(parent.id.as_str().to_string());
                            }
                        }
                    }
                }
            }
            TicketLevel::Parent => unreachable!(),
        }

        self.save(tree).await?;

        // No change ⇒ stop. A change climbs one more level, recursing
        // until the update is idempotent.
        if let Some(parent_id) = changed_parent_id {
            if level == TicketLevel::Grandchild {
                Box::pin(self.propagate_status_to_parent(project_id, &parent_id)).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> (TicketHierarchy, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (TicketHierarchy::new(StateStore::new(dir.path())), dir)
    }

    #[test]
    fn ticket_level_classifies_by_segment_shape() {
        assert_eq!(ticket_level("proj-0001"), Some(TicketLevel::Parent));
        assert_eq!(ticket_level("proj-0001-01"), Some(TicketLevel::Child));
        assert_eq!(ticket_level("proj-0001-01-003"), Some(TicketLevel::Grandchild));
        assert_eq!(ticket_level("not-a-ticket-id"), None);
    }

    #[tokio::test]
    async fn create_parent_rejects_empty_fields() {
        let (h, _dir) = hierarchy();
        assert!(h.create_parent("", "do it", "title").await.is_err());
        assert!(h.create_parent("proj", "", "title").await.is_err());
        assert!(h.create_parent("proj", "do it", "").await.is_err());
    }

    #[tokio::test]
    async fn sequence_numbers_are_monotonic_and_zero_padded() {
        let (h, _dir) = hierarchy();
        let p1 = h.create_parent("proj", "do it", "first").await.unwrap();
        let p2 = h.create_parent("proj", "do it", "second").await.unwrap();
        assert_eq!(p1.id.as_str(), "proj-0001");
        assert_eq!(p2.id.as_str(), "proj-0002");
    }

    #[tokio::test]
    async fn full_tree_round_trips_through_store() {
        let (h, _dir) = hierarchy();
        let parent = h.create_parent("proj", "do it", "parent").await.unwrap();
        let child = h
            .create_child("proj", parent.id.as_str(), "child", WorkerType::Developer)
            .await
            .unwrap();
        let grandchild = h
            .create_grandchild("proj", child.id.as_str(), "gc", vec!["works".to_string()])
            .await
            .unwrap();

        assert_eq!(grandchild.id.as_str(), format!("{}-001", child.id.as_str()));
        assert!(h.get_grandchild("proj", grandchild.id.as_str()).await.unwrap().is_some());
        assert_eq!(h.list_children("proj", parent.id.as_str()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn propagation_climbs_until_idempotent() {
        let (h, _dir) = hierarchy();
        let parent = h.create_parent("proj", "do it", "parent").await.unwrap();
        let child = h
            .create_child("proj", parent.id.as_str(), "child", WorkerType::Developer)
            .await
            .unwrap();
        let gc1 = h
            .create_grandchild("proj", child.id.as_str(), "gc1", vec![])
            .await
            .unwrap();
        let gc2 = h
            .create_grandchild("proj", child.id.as_str(), "gc2", vec![])
            .await
            .unwrap();

        h.update_ticket_status("proj", gc1.id.as_str(), TicketStatus::Completed).await.unwrap();
        h.update_ticket_status("proj", gc2.id.as_str(), TicketStatus::Completed).await.unwrap();
        h.propagate_status_to_parent("proj", gc1.id.as_str()).await.unwrap();

        let reloaded_child = h.get_child("proj", child.id.as_str()).await.unwrap().unwrap();
        assert_eq!(reloaded_child.status, TicketStatus::Completed);
        let reloaded_parent = h.get_parent("proj", parent.id.as_str()).await.unwrap().unwrap();
        assert_eq!(reloaded_parent.status, TicketStatus::Completed);
    }

    #[tokio::test]
    async fn propagation_stops_when_status_unchanged() {
        let (h, _dir) = hierarchy();
        let parent = h.create_parent("proj", "do it", "parent").await.unwrap();
        let child = h
            .create_child("proj", parent.id.as_str(), "child", WorkerType::Developer)
            .await
            .unwrap();
        h.create_grandchild("proj", child.id.as_str(), "gc1", vec![]).await.unwrap();

        // All pending: derive_parent_status returns None, nothing changes.
        h.propagate_status_to_parent("proj", child.id.as_str()).await.unwrap();
        let reloaded_parent = h.get_parent("proj", parent.id.as_str()).await.unwrap().unwrap();
        assert_eq!(reloaded_parent.status, TicketStatus::Pending);
    }
}
