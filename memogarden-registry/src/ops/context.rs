//! Context frames and the view stream.
//!
//! A frame is per-owner working memory: the LRU-N list of visited
//! substantive entities plus the append-only timeline of Views. Views
//! are entities of type `View`, linked to their predecessor through
//! `prev`. Operator frames additionally track which scopes are active
//! and which one holds focus.

use rusqlite::{params, Connection, OptionalExtension};

use memogarden_core::constants::{
    CONTEXT_SIZE_MAX, CONTEXT_SIZE_MIN, PRIMITIVE_TYPES, VIEW_COALESCENCE_TIMEOUT_SECS,
};
use memogarden_core::errors::{GardenResult, MemoGardenError};
use memogarden_core::models::{ContextFrame, OwnerType, View, ViewAction, ViewData};
use memogarden_core::{ids, time};

use super::entity::EntityOps;
use crate::to_storage_err;

/// Context and view-stream operations, borrowed from a session.
pub struct ContextOps<'s> {
    conn: &'s Connection,
}

impl<'s> ContextOps<'s> {
    pub(crate) fn new(conn: &'s Connection) -> Self {
        Self { conn }
    }

    fn entities(&self) -> EntityOps<'s> {
        EntityOps::new(self.conn)
    }

    // =====================================================================
    // Frames
    // =====================================================================

    /// Fetch the primary frame for an owner, creating it when missing.
    /// There is exactly one primary frame per `(owner, owner_type)`.
    pub fn frame_for_owner(
        &self,
        owner: &str,
        owner_type: OwnerType,
        create_if_missing: bool,
    ) -> GardenResult<ContextFrame> {
        let owner = ids::strip_prefix(owner);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT uuid, owner, owner_type, containers, view_timeline,
                        active_scopes, primary_scope, created_at, parent_frame_uuid
                 FROM context_frame
                 WHERE owner = ?1 AND owner_type = ?2 AND parent_frame_uuid IS NULL",
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        let row = stmt
            .query_row(params![owner, owner_type.as_str()], row_to_frame)
            .optional()
            .map_err(|e| to_storage_err(e.to_string()))?;

        match row {
            Some(frame) => frame,
            None if create_if_missing => self.create_frame(owner, owner_type, None),
            None => Err(MemoGardenError::not_found(
                "ContextFrame",
                format!("{}/{owner}", owner_type.as_str()),
            )),
        }
    }

    /// Fork a subordinate frame from a parent. The new frame inherits a
    /// snapshot of the parent's containers; later mutations diverge.
    pub fn fork_frame(
        &self,
        parent_frame_uuid: &str,
        owner: &str,
        owner_type: OwnerType,
    ) -> GardenResult<ContextFrame> {
        let owner = ids::strip_prefix(owner);
        self.create_frame(owner, owner_type, Some(parent_frame_uuid))
    }

    fn create_frame(
        &self,
        owner: &str,
        owner_type: OwnerType,
        parent_frame_uuid: Option<&str>,
    ) -> GardenResult<ContextFrame> {
        let containers = match parent_frame_uuid {
            Some(parent_uuid) => self.frame_by_uuid(parent_uuid)?.containers,
            None => Vec::new(),
        };
        let parent_frame_uuid = parent_frame_uuid.map(|p| ids::strip_prefix(p).to_string());

        let uuid = ids::generate();
        let now = time::now_iso();
        let containers_json =
            serde_json::to_string(&containers).map_err(|e| to_storage_err(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO context_frame (
                    uuid, owner, owner_type, containers, view_timeline,
                    active_scopes, primary_scope, created_at, parent_frame_uuid
                ) VALUES (?1, ?2, ?3, ?4, '[]', '[]', NULL, ?5, ?6)",
                params![
                    uuid,
                    owner,
                    owner_type.as_str(),
                    containers_json,
                    now,
                    parent_frame_uuid,
                ],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;

        Ok(ContextFrame {
            uuid,
            owner: owner.to_string(),
            owner_type,
            containers,
            view_timeline: Vec::new(),
            active_scopes: Vec::new(),
            primary_scope: None,
            created_at: now,
            parent_frame_uuid,
        })
    }

    /// Fetch a frame by UUID.
    pub fn frame_by_uuid(&self, frame_uuid: &str) -> GardenResult<ContextFrame> {
        let frame_uuid = ids::strip_prefix(frame_uuid);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT uuid, owner, owner_type, containers, view_timeline,
                        active_scopes, primary_scope, created_at, parent_frame_uuid
                 FROM context_frame WHERE uuid = ?1",
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        let row = stmt
            .query_row(params![frame_uuid], row_to_frame)
            .optional()
            .map_err(|e| to_storage_err(e.to_string()))?;

        match row {
            Some(frame) => frame,
            None => Err(MemoGardenError::not_found("ContextFrame", frame_uuid)),
        }
    }

    /// Record a visit: move the UUID to the front of the LRU-N list and
    /// truncate to `n`. Visits to primitive-typed entities leave the
    /// frame unchanged; UUIDs with no entity row are admitted (they may
    /// reference facts).
    pub fn update_containers(
        &self,
        frame_uuid: &str,
        visited_uuid: &str,
        n: usize,
    ) -> GardenResult<ContextFrame> {
        if !(CONTEXT_SIZE_MIN..=CONTEXT_SIZE_MAX).contains(&n) {
            return Err(MemoGardenError::validation(format!(
                "context size must be between {CONTEXT_SIZE_MIN} and {CONTEXT_SIZE_MAX}, got {n}"
            )));
        }

        let mut frame = self.frame_by_uuid(frame_uuid)?;
        let visited = ids::strip_prefix(visited_uuid).to_string();

        if let Ok(entity) = self.entities().get(&visited) {
            if PRIMITIVE_TYPES.contains(&entity.entity_type.as_str()) {
                return Ok(frame);
            }
        }

        frame.containers.retain(|uuid| uuid != &visited);
        frame.containers.insert(0, visited);
        frame.containers.truncate(n);

        self.write_frame_lists(&frame)?;
        Ok(frame)
    }

    // =====================================================================
    // Views
    // =====================================================================

    /// Create a View entity for a frame. The actions list must be
    /// non-empty and the frame must exist.
    pub fn create_view(
        &self,
        frame_uuid: &str,
        actor: &str,
        actions: Vec<ViewAction>,
        prev: Option<String>,
    ) -> GardenResult<View> {
        if actions.is_empty() {
            return Err(MemoGardenError::validation(
                "a view must record at least one action",
            ));
        }
        let frame = self.frame_by_uuid(frame_uuid).map_err(|e| match e {
            MemoGardenError::NotFound { .. } => MemoGardenError::validation(format!(
                "context frame '{frame_uuid}' does not exist"
            )),
            other => other,
        })?;

        let data = ViewData {
            actor: ids::strip_prefix(actor).to_string(),
            started_at: actions[0].timestamp.clone(),
            ended_at: None,
            prev: prev.map(|p| ids::strip_prefix(&p).to_string()),
            context_frame_uuid: frame.uuid.clone(),
            actions,
        };
        let payload =
            serde_json::to_value(&data).map_err(|e| to_storage_err(e.to_string()))?;
        let uuid = self.entities().create("View", None, None, Some(payload))?;

        Ok(View { uuid, data })
    }

    /// Fetch a View by its entity UUID.
    pub fn get_view(&self, view_uuid: &str) -> GardenResult<View> {
        let entity = self.entities().get(view_uuid)?;
        if entity.entity_type != "View" {
            return Err(MemoGardenError::validation(format!(
                "entity '{}' is not a View",
                entity.uuid
            )));
        }
        let data: ViewData = entity.payload()?;
        Ok(View {
            uuid: entity.uuid,
            data,
        })
    }

    /// Append a View to a frame's timeline, linking it to the prior
    /// tail through `prev`. The first append binds `prev`; appends into
    /// further frames leave it untouched.
    pub fn append_view(&self, frame_uuid: &str, view_uuid: &str) -> GardenResult<ContextFrame> {
        let mut frame = self.frame_by_uuid(frame_uuid)?;
        let view = self.get_view(view_uuid)?;

        let tail = frame.view_timeline.last().cloned();
        if view.data.prev.is_none() {
            if let Some(tail) = tail {
                if tail != view.uuid {
                    let mut data = view.data.clone();
                    data.prev = Some(tail);
                    let payload = serde_json::to_value(&data)
                        .map_err(|e| to_storage_err(e.to_string()))?;
                    self.entities().update_data(&view.uuid, payload)?;
                }
            }
        }

        frame.view_timeline.push(view.uuid);
        self.write_frame_lists(&frame)?;
        Ok(frame)
    }

    /// Append the same View to several frames. Callers run this inside
    /// one session, so either every frame records the View or none does.
    pub fn append_view_to_contexts(
        &self,
        view_uuid: &str,
        frame_uuids: &[&str],
    ) -> GardenResult<()> {
        for frame_uuid in frame_uuids {
            self.append_view(frame_uuid, view_uuid)?;
        }
        Ok(())
    }

    /// Try to extend an open View with newly observed actions. Succeeds
    /// when the View is open, belongs to the same actor, and the idle
    /// gap is within the coalescence window; otherwise the caller
    /// creates a new View.
    pub fn try_coalesce(
        &self,
        view_uuid: &str,
        actor: &str,
        actions: Vec<ViewAction>,
        timeout_secs: Option<i64>,
    ) -> GardenResult<bool> {
        if actions.is_empty() {
            return Ok(false);
        }
        let view = self.get_view(view_uuid)?;
        let timeout = timeout_secs.unwrap_or(VIEW_COALESCENCE_TIMEOUT_SECS);

        if !view.is_open() || view.data.actor != ids::strip_prefix(actor) {
            return Ok(false);
        }

        let last = view
            .last_action_timestamp()
            .and_then(time::parse_iso);
        let next = time::parse_iso(&actions[0].timestamp);
        let (Some(last), Some(next)) = (last, next) else {
            return Ok(false);
        };
        if (next - last).num_seconds() > timeout {
            return Ok(false);
        }

        let mut data = view.data.clone();
        data.actions.extend(actions);
        let payload = serde_json::to_value(&data).map_err(|e| to_storage_err(e.to_string()))?;
        self.entities().update_data(&view.uuid, payload)?;
        Ok(true)
    }

    /// Close a View so it no longer coalesces.
    pub fn close_view(&self, view_uuid: &str) -> GardenResult<View> {
        let view = self.get_view(view_uuid)?;
        let mut data = view.data.clone();
        data.ended_at = Some(time::now_iso());
        let payload = serde_json::to_value(&data).map_err(|e| to_storage_err(e.to_string()))?;
        self.entities().update_data(&view.uuid, payload)?;
        Ok(View {
            uuid: view.uuid,
            data,
        })
    }

    // =====================================================================
    // Scope verbs (operator frames only)
    // =====================================================================

    /// Enter a scope: it joins `active_scopes`. Entering is not
    /// focusing, but a frame with no focus adopts the entered scope.
    pub fn enter_scope(&self, frame_uuid: &str, scope_uuid: &str) -> GardenResult<ContextFrame> {
        let mut frame = self.operator_frame(frame_uuid)?;
        let scope = ids::strip_prefix(scope_uuid).to_string();

        if !frame.active_scopes.contains(&scope) {
            frame.active_scopes.push(scope.clone());
        }
        if frame.primary_scope.is_none() {
            frame.primary_scope = Some(scope);
        }
        self.write_frame_lists(&frame)?;
        Ok(frame)
    }

    /// Leave a scope: it drops out of `active_scopes`, its view-stream
    /// suspends, and focus clears if it held it.
    pub fn leave_scope(&self, frame_uuid: &str, scope_uuid: &str) -> GardenResult<ContextFrame> {
        let mut frame = self.operator_frame(frame_uuid)?;
        let scope = ids::strip_prefix(scope_uuid).to_string();

        frame.active_scopes.retain(|s| s != &scope);
        if frame.primary_scope.as_deref() == Some(scope.as_str()) {
            frame.primary_scope = None;
        }
        self.write_frame_lists(&frame)?;
        Ok(frame)
    }

    /// Focus a scope that is already active.
    pub fn focus_scope(&self, frame_uuid: &str, scope_uuid: &str) -> GardenResult<ContextFrame> {
        let mut frame = self.operator_frame(frame_uuid)?;
        let scope = ids::strip_prefix(scope_uuid).to_string();

        if !frame.active_scopes.contains(&scope) {
            return Err(MemoGardenError::validation(format!(
                "scope '{scope}' is not active; enter it before focusing"
            )));
        }
        frame.primary_scope = Some(scope);
        self.write_frame_lists(&frame)?;
        Ok(frame)
    }

    fn operator_frame(&self, frame_uuid: &str) -> GardenResult<ContextFrame> {
        let frame = self.frame_by_uuid(frame_uuid)?;
        if frame.owner_type != OwnerType::Operator {
            return Err(MemoGardenError::validation(format!(
                "scope verbs apply to operator frames only, not {}",
                frame.owner_type.as_str()
            )));
        }
        Ok(frame)
    }

    fn write_frame_lists(&self, frame: &ContextFrame) -> GardenResult<()> {
        let containers =
            serde_json::to_string(&frame.containers).map_err(|e| to_storage_err(e.to_string()))?;
        let view_timeline = serde_json::to_string(&frame.view_timeline)
            .map_err(|e| to_storage_err(e.to_string()))?;
        let active_scopes = serde_json::to_string(&frame.active_scopes)
            .map_err(|e| to_storage_err(e.to_string()))?;

        self.conn
            .execute(
                "UPDATE context_frame
                 SET containers = ?1, view_timeline = ?2, active_scopes = ?3, primary_scope = ?4
                 WHERE uuid = ?5",
                params![
                    containers,
                    view_timeline,
                    active_scopes,
                    frame.primary_scope,
                    frame.uuid,
                ],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(())
    }
}

fn row_to_frame(
    row: &rusqlite::Row<'_>,
) -> Result<GardenResult<ContextFrame>, rusqlite::Error> {
    let owner_type_str: String = row.get(2)?;
    let containers_json: String = row.get(3)?;
    let view_timeline_json: String = row.get(4)?;
    let active_scopes_json: String = row.get(5)?;

    let Some(owner_type) = OwnerType::parse(&owner_type_str) else {
        return Ok(Err(MemoGardenError::validation(format!(
            "owner_type must be operator, agent, or scope, got '{owner_type_str}'"
        ))));
    };
    let parse_list = |json: &str, what: &str| -> GardenResult<Vec<String>> {
        serde_json::from_str(json).map_err(|e| to_storage_err(format!("parse {what}: {e}")))
    };
    let containers = match parse_list(&containers_json, "containers") {
        Ok(v) => v,
        Err(e) => return Ok(Err(e)),
    };
    let view_timeline = match parse_list(&view_timeline_json, "view_timeline") {
        Ok(v) => v,
        Err(e) => return Ok(Err(e)),
    };
    let active_scopes = match parse_list(&active_scopes_json, "active_scopes") {
        Ok(v) => v,
        Err(e) => return Ok(Err(e)),
    };

    Ok(Ok(ContextFrame {
        uuid: row.get(0)?,
        owner: row.get(1)?,
        owner_type,
        containers,
        view_timeline,
        active_scopes,
        primary_scope: row.get(6)?,
        created_at: row.get(7)?,
        parent_frame_uuid: row.get(8)?,
    }))
}
