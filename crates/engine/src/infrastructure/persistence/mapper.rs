//! Object mapper: documents to relational rows and back.
//!
//! Every operation is driven by the type's registry descriptor:
//! - scalars are columns of the type's table
//! - map fields are rows of `<table>_<field>`
//! - owned children are rows of the child's table plus a `child_ownership` edge
//! - links are rows of `<table>_<field>` holding `(source, target)` numerics
//!
//! Links are written after every row of a cascade exists, so a cascade may link
//! to itself or to its own children. Loading resolves links to identifiers only
//! and never follows them, so cyclic links load in one pass.
//!
//! Identifiers for drafts are taken from the allocator before a unit of work
//! opens. After a successful commit every written identifier is observed by
//! the allocator; if the operation fails the fresh identifiers are released.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{Map, Value};
use sqlx::SqliteConnection;
use taleweaver_domain::object::{document_obj_id, set_document_obj_id};
use taleweaver_domain::registry::{describe_prefix, links_targeting};
use taleweaver_domain::{
    ChildField, Document, Identifier, LinkField, ObjId, OwnerId, TypeDescriptor,
};

use super::codec::{
    self, decode_links, decode_map_value, decode_scalar, encode_links, encode_map, encode_scalar,
    numeric_from_sql, numeric_to_sql,
};
use super::store::SqliteStore;
use crate::infrastructure::id_allocator::IdAllocator;
use crate::infrastructure::ports::{PersistOutcome, RepoError};

/// A link row waiting for the rest of the cascade to be written.
struct PendingLink {
    descriptor: &'static TypeDescriptor,
    field: &'static LinkField,
    source: u64,
    target: ObjId,
}

#[derive(Clone)]
pub struct ObjectMapper {
    store: SqliteStore,
    allocator: Arc<IdAllocator>,
}

impl ObjectMapper {
    pub fn new(store: SqliteStore, allocator: Arc<IdAllocator>) -> Self {
        Self { store, allocator }
    }

    pub fn allocator(&self) -> &Arc<IdAllocator> {
        &self.allocator
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persist a root object and its owned children.
    ///
    /// If a row for the root identifier already exists in `owner`'s scope the
    /// stored object is returned unchanged with `created == false`.
    pub async fn persist(
        &self,
        descriptor: &'static TypeDescriptor,
        mut doc: Document,
        owner: OwnerId,
    ) -> Result<PersistOutcome, RepoError> {
        let mut allocated = Vec::new();
        let result: Result<PersistOutcome, RepoError> = async {
            self.assign_tree(descriptor, &mut doc, owner, &mut allocated)
                .await?;
            let mut uow = self.store.begin_write().await?;
            let result = persist_in(uow.conn(), descriptor, &doc, owner).await;
            uow.finish(result).await
        }
        .await;

        match &result {
            Ok(outcome) if outcome.created => {
                self.observe_tree(descriptor, &outcome.document, owner)
                    .await;
            }
            _ => self.release_all(&allocated).await,
        }
        result
    }

    /// Persist a batch of roots in one unit of work. Every root must carry an
    /// assigned identifier; draft children are still assigned fresh ones.
    pub async fn persist_many(
        &self,
        items: Vec<(&'static TypeDescriptor, Document)>,
        owner: OwnerId,
    ) -> Result<Vec<PersistOutcome>, RepoError> {
        let mut allocated = Vec::new();
        let result: Result<Vec<PersistOutcome>, RepoError> = async {
            let mut prepared = Vec::with_capacity(items.len());
            for (descriptor, mut doc) in items {
                let id = document_obj_id(&doc, descriptor)?;
                if !id.is_assigned() {
                    return Err(RepoError::validation(format!(
                        "imported {} has no assigned obj_id",
                        descriptor.type_name
                    )));
                }
                self.assign_tree(descriptor, &mut doc, owner, &mut allocated)
                    .await?;
                prepared.push((descriptor, doc));
            }

            let mut uow = self.store.begin_write().await?;
            let result = persist_many_in(uow.conn(), &prepared, owner).await;
            uow.finish(result).await
        }
        .await;

        match &result {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| o.created) {
                    if let Ok(descriptor) = root_descriptor(&outcome.document) {
                        self.observe_tree(descriptor, &outcome.document, owner)
                            .await;
                    }
                }
                // Drafts assigned for roots that already existed were never written.
                if outcomes.iter().any(|o| !o.created) {
                    self.release_unwritten(&allocated, outcomes).await;
                }
            }
            Err(_) => self.release_all(&allocated).await,
        }
        result
    }

    /// Overwrite an existing object. Scalars and maps are overwritten, owned
    /// children are cleared and re-inserted, links are diffed.
    pub async fn replace(
        &self,
        descriptor: &'static TypeDescriptor,
        id: &ObjId,
        mut doc: Document,
        owner: OwnerId,
    ) -> Result<Document, RepoError> {
        id.validate()?;
        let body_id = document_obj_id(&doc, descriptor)?;
        if &body_id != id {
            return Err(RepoError::validation(format!(
                "identifier mismatch: path names {id}, body carries {body_id}"
            )));
        }

        let mut allocated = Vec::new();
        let result: Result<(Document, Vec<ObjId>), RepoError> = async {
            self.assign_children(descriptor, &mut doc, owner, &mut allocated)
                .await?;
            let mut uow = self.store.begin_write().await?;
            let result = replace_in(uow.conn(), descriptor, id, &doc, owner).await;
            uow.finish(result).await
        }
        .await;

        match result {
            Ok((document, discarded)) => {
                self.observe_tree(descriptor, &document, owner).await;
                for child in discarded {
                    self.allocator.release(&child.scoped(owner)).await;
                }
                tracing::debug!(id = %id, owner = %owner, "Replaced object");
                Ok(document)
            }
            Err(err) => {
                self.release_all(&allocated).await;
                Err(err)
            }
        }
    }

    /// Delete an object and, recursively, its owned children. Linked objects
    /// are left alone; link rows naming the deleted objects are removed.
    pub async fn delete(
        &self,
        descriptor: &'static TypeDescriptor,
        id: &ObjId,
        owner: OwnerId,
    ) -> Result<(), RepoError> {
        let mut uow = self.store.begin_write().await?;
        let result = delete_in(uow.conn(), descriptor, id, owner).await;
        let removed = uow.finish(result).await?;

        for removed_id in removed {
            self.allocator.release(&removed_id.scoped(owner)).await;
        }
        tracing::debug!(id = %id, owner = %owner, "Deleted object");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn load(
        &self,
        descriptor: &'static TypeDescriptor,
        id: &ObjId,
        owner: OwnerId,
    ) -> Result<Option<Document>, RepoError> {
        let mut uow = self.store.begin_read().await?;
        let result = load_tree(uow.conn(), descriptor, id, owner).await;
        uow.finish(result).await
    }

    /// Top-level identifiers of a type in `owner`'s scope, ascending by numeric.
    pub async fn list_by_owner(
        &self,
        descriptor: &'static TypeDescriptor,
        owner: OwnerId,
    ) -> Result<Vec<ObjId>, RepoError> {
        let mut uow = self.store.begin_read().await?;
        let result = list_roots(uow.conn(), descriptor, owner).await;
        uow.finish(result).await
    }

    /// Hydrated top-level objects, read in one unit of work.
    pub async fn load_all(
        &self,
        descriptor: &'static TypeDescriptor,
        owner: OwnerId,
    ) -> Result<Vec<Document>, RepoError> {
        let mut uow = self.store.begin_read().await?;
        let result: Result<Vec<Document>, RepoError> = async {
            let conn = uow.conn();
            let ids = list_roots(&mut *conn, descriptor, owner).await?;
            let mut docs = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(doc) = load_tree(&mut *conn, descriptor, id, owner).await? {
                    docs.push(doc);
                }
            }
            Ok(docs)
        }
        .await;
        uow.finish(result).await
    }

    /// The parent holding `id` as an owned child, if any.
    pub async fn parent_of(
        &self,
        descriptor: &'static TypeDescriptor,
        id: &ObjId,
        owner: OwnerId,
    ) -> Result<Option<ObjId>, RepoError> {
        let numeric = numeric_to_sql(id.numeric)?;
        let mut uow = self.store.begin_read().await?;
        let result: Result<Option<ObjId>, RepoError> = async {
            let row: Option<(String, i64)> = sqlx::query_as(
                "SELECT parent_prefix, parent_numeric FROM child_ownership \
                 WHERE owner = ? AND child_prefix = ? AND child_numeric = ?",
            )
            .bind(owner.get())
            .bind(descriptor.prefix)
            .bind(numeric)
            .fetch_optional(uow.conn())
            .await
            .map_err(|e| RepoError::transaction("parent_of", e))?;

            row.map(|(prefix, n)| Ok::<_, RepoError>(ObjId::new(prefix, numeric_from_sql(n)?)))
                .transpose()
        }
        .await;
        uow.finish(result).await
    }

    // =========================================================================
    // Identifier bookkeeping
    // =========================================================================

    fn assign_tree<'a>(
        &'a self,
        descriptor: &'static TypeDescriptor,
        doc: &'a mut Document,
        owner: OwnerId,
        allocated: &'a mut Vec<Identifier>,
    ) -> BoxFuture<'a, Result<(), RepoError>> {
        async move {
            let id = document_obj_id(doc, descriptor)?;
            if id.is_assigned() {
                id.validate()?;
                self.allocator.check_explicit(&id.clone().scoped(owner))?;
                set_document_obj_id(doc, &id);
            } else {
                let fresh = self.allocator.allocate(descriptor.prefix, owner).await?;
                set_document_obj_id(doc, &fresh.obj_id);
                allocated.push(fresh);
            }
            self.assign_children(descriptor, doc, owner, allocated)
                .await
        }
        .boxed()
    }

    fn assign_children<'a>(
        &'a self,
        descriptor: &'static TypeDescriptor,
        doc: &'a mut Document,
        owner: OwnerId,
        allocated: &'a mut Vec<Identifier>,
    ) -> BoxFuture<'a, Result<(), RepoError>> {
        async move {
            for field in descriptor.children {
                let items = match doc.get_mut(field.name) {
                    None | Some(Value::Null) => continue,
                    Some(Value::Array(items)) => items,
                    Some(_) => return Err(children_shape_error(descriptor, field)),
                };
                for item in items.iter_mut() {
                    let Value::Object(child) = item else {
                        return Err(children_shape_error(descriptor, field));
                    };
                    self.assign_tree(field.child, child, owner, &mut *allocated)
                        .await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn observe_tree(
        &self,
        descriptor: &'static TypeDescriptor,
        doc: &Document,
        owner: OwnerId,
    ) {
        let mut ids = Vec::new();
        collect_ids(descriptor, doc, &mut ids);
        for id in ids {
            self.allocator.observe(&id.scoped(owner)).await;
        }
    }

    async fn release_all(&self, allocated: &[Identifier]) {
        for id in allocated {
            self.allocator.release(id).await;
        }
    }

    async fn release_unwritten(&self, allocated: &[Identifier], outcomes: &[PersistOutcome]) {
        let mut written = HashSet::new();
        for outcome in outcomes.iter().filter(|o| o.created) {
            if let Ok(descriptor) = root_descriptor(&outcome.document) {
                let mut ids = Vec::new();
                collect_ids(descriptor, &outcome.document, &mut ids);
                written.extend(ids);
            }
        }
        for id in allocated.iter().filter(|id| !written.contains(&id.obj_id)) {
            self.allocator.release(id).await;
        }
    }
}

// =============================================================================
// Document helpers
// =============================================================================

fn children_shape_error(descriptor: &TypeDescriptor, field: &ChildField) -> RepoError {
    RepoError::validation(format!(
        "{}.{} must be a list of {} objects",
        descriptor.type_name, field.name, field.child.type_name
    ))
}

/// The owned child documents under `field`, in order.
fn child_documents<'d>(
    descriptor: &TypeDescriptor,
    doc: &'d Document,
    field: &ChildField,
) -> Result<Vec<&'d Document>, RepoError> {
    match doc.get(field.name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(child) => Ok(child),
                _ => Err(children_shape_error(descriptor, field)),
            })
            .collect(),
        Some(_) => Err(children_shape_error(descriptor, field)),
    }
}

/// Identifiers of a document and all of its owned children. Malformed parts
/// are skipped.
fn collect_ids(descriptor: &TypeDescriptor, doc: &Document, out: &mut Vec<ObjId>) {
    if let Ok(id) = document_obj_id(doc, descriptor) {
        if id.is_assigned() {
            out.push(id);
        }
    }
    for field in descriptor.children {
        if let Ok(children) = child_documents(descriptor, doc, field) {
            for child in children {
                collect_ids(field.child, child, out);
            }
        }
    }
}

fn root_descriptor(doc: &Document) -> Result<&'static TypeDescriptor, RepoError> {
    let prefix = doc
        .get(taleweaver_domain::object::OBJ_ID_KEY)
        .and_then(|v| v.get("prefix"))
        .and_then(Value::as_str)
        .ok_or_else(|| RepoError::validation("document has no obj_id"))?;
    Ok(describe_prefix(prefix)?)
}

// =============================================================================
// Row operations (inside a unit of work)
// =============================================================================

async fn row_exists(
    conn: &mut SqliteConnection,
    descriptor: &TypeDescriptor,
    numeric: i64,
    owner: OwnerId,
) -> Result<bool, RepoError> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE owner = ? AND numeric = ?",
        descriptor.table
    );
    let found: Option<i64> = sqlx::query_scalar(&sql)
        .bind(owner.get())
        .bind(numeric)
        .fetch_optional(conn)
        .await
        .map_err(|e| RepoError::transaction("row_exists", e))?;
    Ok(found.is_some())
}

async fn child_numerics(
    conn: &mut SqliteConnection,
    parent: &TypeDescriptor,
    parent_numeric: i64,
    field: &ChildField,
    owner: OwnerId,
) -> Result<Vec<i64>, RepoError> {
    sqlx::query_scalar(
        "SELECT child_numeric FROM child_ownership \
         WHERE owner = ? AND parent_prefix = ? AND parent_numeric = ? AND field = ? \
         ORDER BY position",
    )
    .bind(owner.get())
    .bind(parent.prefix)
    .bind(parent_numeric)
    .bind(field.name)
    .fetch_all(conn)
    .await
    .map_err(|e| RepoError::transaction("child_numerics", e))
}

async fn persist_in(
    conn: &mut SqliteConnection,
    descriptor: &'static TypeDescriptor,
    doc: &Document,
    owner: OwnerId,
) -> Result<PersistOutcome, RepoError> {
    let id = document_obj_id(doc, descriptor)?;
    id.validate()?;

    if let Some(existing) = load_tree(&mut *conn, descriptor, &id, owner).await? {
        tracing::debug!(id = %id, owner = %owner, "Object already persisted, returning stored row");
        return Ok(PersistOutcome {
            document: existing,
            created: false,
        });
    }

    let mut pending = Vec::new();
    insert_tree(&mut *conn, descriptor, doc, owner, &mut pending).await?;
    flush_links(&mut *conn, owner, pending).await?;

    let document = load_tree(&mut *conn, descriptor, &id, owner)
        .await?
        .ok_or_else(|| RepoError::transaction("persist", format!("{id} missing after insert")))?;
    Ok(PersistOutcome {
        document,
        created: true,
    })
}

async fn persist_many_in(
    conn: &mut SqliteConnection,
    items: &[(&'static TypeDescriptor, Document)],
    owner: OwnerId,
) -> Result<Vec<PersistOutcome>, RepoError> {
    let mut pending = Vec::new();
    let mut roots = Vec::with_capacity(items.len());

    for (descriptor, doc) in items {
        let id = document_obj_id(doc, descriptor)?;
        let numeric = numeric_to_sql(id.numeric)?;
        let created = if row_exists(&mut *conn, descriptor, numeric, owner).await? {
            false
        } else {
            insert_tree(&mut *conn, descriptor, doc, owner, &mut pending).await?;
            true
        };
        roots.push((*descriptor, id, created));
    }

    flush_links(&mut *conn, owner, pending).await?;

    let mut outcomes = Vec::with_capacity(roots.len());
    for (descriptor, id, created) in roots {
        let document = load_tree(&mut *conn, descriptor, &id, owner)
            .await?
            .ok_or_else(|| RepoError::transaction("persist_many", format!("{id} missing")))?;
        outcomes.push(PersistOutcome { document, created });
    }
    Ok(outcomes)
}

/// Insert the rows of `doc` and its children. Links are queued in `pending`.
fn insert_tree<'a>(
    conn: &'a mut SqliteConnection,
    descriptor: &'static TypeDescriptor,
    doc: &'a Document,
    owner: OwnerId,
    pending: &'a mut Vec<PendingLink>,
) -> BoxFuture<'a, Result<(), RepoError>> {
    async move {
        let id = document_obj_id(doc, descriptor)?;
        id.validate()?;
        let numeric = numeric_to_sql(id.numeric)?;

        if row_exists(&mut *conn, descriptor, numeric, owner).await? {
            return Err(RepoError::validation(format!(
                "{id} already exists and cannot be stored again"
            )));
        }

        sqlx::query("INSERT INTO identifiers (prefix, numeric, owner) VALUES (?, ?, ?)")
            .bind(descriptor.prefix)
            .bind(numeric)
            .bind(owner.get())
            .execute(&mut *conn)
            .await
            .map_err(|e| RepoError::transaction("insert_identifier", e))?;

        let columns: String = descriptor
            .scalars
            .iter()
            .map(|f| format!(", {}", f.name))
            .collect();
        let sql = format!(
            "INSERT INTO {} (owner, numeric{columns}) VALUES (?, ?{})",
            descriptor.table,
            ", ?".repeat(descriptor.scalars.len())
        );
        let mut query = sqlx::query(&sql).bind(owner.get()).bind(numeric);
        for field in descriptor.scalars {
            query = codec::bind(query, encode_scalar(descriptor, doc, field)?);
        }
        query
            .execute(&mut *conn)
            .await
            .map_err(|e| RepoError::transaction("insert_row", e))?;

        write_maps(&mut *conn, descriptor, doc, numeric, owner).await?;
        write_children(&mut *conn, descriptor, &id, doc, owner, &mut *pending).await?;

        for field in descriptor.links {
            for target in encode_links(descriptor, doc, field)? {
                pending.push(PendingLink {
                    descriptor,
                    field,
                    source: id.numeric,
                    target,
                });
            }
        }

        sqlx::query(
            "INSERT INTO id_counters (prefix, owner, last_numeric) VALUES (?, ?, ?) \
             ON CONFLICT (prefix, owner) DO UPDATE \
             SET last_numeric = MAX(last_numeric, excluded.last_numeric)",
        )
        .bind(descriptor.prefix)
        .bind(owner.get())
        .bind(numeric)
        .execute(&mut *conn)
        .await
        .map_err(|e| RepoError::transaction("update_counter", e))?;

        tracing::debug!(id = %id, owner = %owner, "Inserted row");
        Ok(())
    }
    .boxed()
}

async fn write_maps(
    conn: &mut SqliteConnection,
    descriptor: &TypeDescriptor,
    doc: &Document,
    numeric: i64,
    owner: OwnerId,
) -> Result<(), RepoError> {
    for field in descriptor.maps {
        let sql = format!(
            "INSERT INTO {} (owner, numeric, key, value) VALUES (?, ?, ?, ?)",
            descriptor.map_table(field)
        );
        for (key, value) in encode_map(descriptor, doc, field)? {
            sqlx::query(&sql)
                .bind(owner.get())
                .bind(numeric)
                .bind(key)
                .bind(value)
                .execute(&mut *conn)
                .await
                .map_err(|e| RepoError::transaction("insert_map_entry", e))?;
        }
    }
    Ok(())
}

async fn write_children(
    conn: &mut SqliteConnection,
    descriptor: &'static TypeDescriptor,
    parent: &ObjId,
    doc: &Document,
    owner: OwnerId,
    pending: &mut Vec<PendingLink>,
) -> Result<(), RepoError> {
    let parent_numeric = numeric_to_sql(parent.numeric)?;
    for field in descriptor.children {
        let children = child_documents(descriptor, doc, field)?;
        for (position, child) in children.into_iter().enumerate() {
            let child_id = document_obj_id(child, field.child)?;
            insert_tree(&mut *conn, field.child, child, owner, &mut *pending).await?;

            sqlx::query(
                "INSERT INTO child_ownership (owner, parent_prefix, parent_numeric, field, \
                 position, child_prefix, child_numeric) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(owner.get())
            .bind(descriptor.prefix)
            .bind(parent_numeric)
            .bind(field.name)
            .bind(position as i64)
            .bind(field.child.prefix)
            .bind(numeric_to_sql(child_id.numeric)?)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepoError::transaction("insert_child_ownership", e))?;
        }
    }
    Ok(())
}

/// Write queued link rows. Every target must have a row in the same scope.
async fn flush_links(
    conn: &mut SqliteConnection,
    owner: OwnerId,
    pending: Vec<PendingLink>,
) -> Result<(), RepoError> {
    for link in pending {
        let target_descriptor = describe_prefix(link.field.target)?;
        let target = numeric_to_sql(link.target.numeric)?;
        if !row_exists(&mut *conn, target_descriptor, target, owner).await? {
            return Err(RepoError::dangling(
                format!("{}.{}", link.descriptor.type_name, link.field.name),
                &link.target,
            ));
        }

        let sql = format!(
            "INSERT OR IGNORE INTO {} (owner, source_numeric, target_numeric) VALUES (?, ?, ?)",
            link.descriptor.link_table(link.field)
        );
        sqlx::query(&sql)
            .bind(owner.get())
            .bind(numeric_to_sql(link.source)?)
            .bind(target)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepoError::transaction("insert_link", e))?;
    }
    Ok(())
}

/// Returns the hydrated document plus the identifiers of children that were
/// dropped from the object.
async fn replace_in(
    conn: &mut SqliteConnection,
    descriptor: &'static TypeDescriptor,
    id: &ObjId,
    doc: &Document,
    owner: OwnerId,
) -> Result<(Document, Vec<ObjId>), RepoError> {
    let numeric = numeric_to_sql(id.numeric)?;
    if !row_exists(&mut *conn, descriptor, numeric, owner).await? {
        return Err(RepoError::not_found(descriptor.type_name, id));
    }

    if !descriptor.scalars.is_empty() {
        let assignments = descriptor
            .scalars
            .iter()
            .map(|f| format!("{} = ?", f.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE owner = ? AND numeric = ?",
            descriptor.table
        );
        let mut query = sqlx::query(&sql);
        for field in descriptor.scalars {
            query = codec::bind(query, encode_scalar(descriptor, doc, field)?);
        }
        query
            .bind(owner.get())
            .bind(numeric)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepoError::transaction("update_row", e))?;
    }

    for field in descriptor.maps {
        let sql = format!(
            "DELETE FROM {} WHERE owner = ? AND numeric = ?",
            descriptor.map_table(field)
        );
        sqlx::query(&sql)
            .bind(owner.get())
            .bind(numeric)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepoError::transaction("clear_map", e))?;
    }
    write_maps(&mut *conn, descriptor, doc, numeric, owner).await?;

    // Children: clear and re-insert. Links pointing at a child that comes back
    // with the same identifier are kept.
    let mut incoming = HashSet::new();
    for field in descriptor.children {
        for child in child_documents(descriptor, doc, field)? {
            incoming.insert(document_obj_id(child, field.child)?);
        }
    }
    let mut removed = Vec::new();
    for field in descriptor.children {
        for child_numeric in child_numerics(&mut *conn, descriptor, numeric, field, owner).await? {
            let child_id = ObjId::new(field.child.prefix, numeric_from_sql(child_numeric)?);
            let drop_inbound = !incoming.contains(&child_id);
            delete_tree(
                &mut *conn,
                field.child,
                &child_id,
                owner,
                drop_inbound,
                &mut removed,
            )
            .await?;
        }
    }
    let mut pending = Vec::new();
    write_children(&mut *conn, descriptor, id, doc, owner, &mut pending).await?;

    // Links: diff against the stored set.
    for field in descriptor.links {
        let table = descriptor.link_table(field);
        let current: BTreeSet<i64> = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT target_numeric FROM {table} WHERE owner = ? AND source_numeric = ?"
        ))
        .bind(owner.get())
        .bind(numeric)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| RepoError::transaction("load_links", e))?
        .into_iter()
        .collect();

        let desired = encode_links(descriptor, doc, field)?;
        let desired_numerics = desired
            .iter()
            .map(|t| numeric_to_sql(t.numeric))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let delete_sql = format!(
            "DELETE FROM {table} WHERE owner = ? AND source_numeric = ? AND target_numeric = ?"
        );
        for stale in current.difference(&desired_numerics) {
            sqlx::query(&delete_sql)
                .bind(owner.get())
                .bind(numeric)
                .bind(*stale)
                .execute(&mut *conn)
                .await
                .map_err(|e| RepoError::transaction("remove_link", e))?;
        }

        for target in desired {
            if !current.contains(&numeric_to_sql(target.numeric)?) {
                pending.push(PendingLink {
                    descriptor,
                    field,
                    source: id.numeric,
                    target,
                });
            }
        }
    }
    flush_links(&mut *conn, owner, pending).await?;

    let document = load_tree(&mut *conn, descriptor, id, owner)
        .await?
        .ok_or_else(|| RepoError::transaction("replace", format!("{id} missing after update")))?;
    let discarded = removed
        .into_iter()
        .filter(|child| !incoming.contains(child))
        .collect();
    Ok((document, discarded))
}

async fn delete_in(
    conn: &mut SqliteConnection,
    descriptor: &'static TypeDescriptor,
    id: &ObjId,
    owner: OwnerId,
) -> Result<Vec<ObjId>, RepoError> {
    let numeric = numeric_to_sql(id.numeric)?;
    if id.prefix != descriptor.prefix
        || !row_exists(&mut *conn, descriptor, numeric, owner).await?
    {
        return Err(RepoError::not_found(descriptor.type_name, id));
    }
    let mut removed = Vec::new();
    delete_tree(conn, descriptor, id, owner, true, &mut removed).await?;
    Ok(removed)
}

/// Remove an object's rows and, recursively, its children. With
/// `drop_inbound` link rows that target the object are removed as well.
fn delete_tree<'a>(
    conn: &'a mut SqliteConnection,
    descriptor: &'static TypeDescriptor,
    id: &'a ObjId,
    owner: OwnerId,
    drop_inbound: bool,
    removed: &'a mut Vec<ObjId>,
) -> BoxFuture<'a, Result<(), RepoError>> {
    async move {
        let numeric = numeric_to_sql(id.numeric)?;
        let owner_sql = owner.get();

        for field in descriptor.children {
            let child_rows = child_numerics(&mut *conn, descriptor, numeric, field, owner).await?;
            for child_numeric in child_rows {
                let child_id = ObjId::new(field.child.prefix, numeric_from_sql(child_numeric)?);
                delete_tree(
                    &mut *conn,
                    field.child,
                    &child_id,
                    owner,
                    true,
                    &mut *removed,
                )
                .await?;
            }
        }

        sqlx::query(
            "DELETE FROM child_ownership WHERE owner = ? AND \
             ((child_prefix = ? AND child_numeric = ?) OR \
             (parent_prefix = ? AND parent_numeric = ?))",
        )
        .bind(owner_sql)
        .bind(descriptor.prefix)
        .bind(numeric)
        .bind(descriptor.prefix)
        .bind(numeric)
        .execute(&mut *conn)
        .await
        .map_err(|e| RepoError::transaction("delete_child_ownership", e))?;

        for field in descriptor.maps {
            let sql = format!(
                "DELETE FROM {} WHERE owner = ? AND numeric = ?",
                descriptor.map_table(field)
            );
            sqlx::query(&sql)
                .bind(owner_sql)
                .bind(numeric)
                .execute(&mut *conn)
                .await
                .map_err(|e| RepoError::transaction("delete_map", e))?;
        }

        for field in descriptor.links {
            let sql = format!(
                "DELETE FROM {} WHERE owner = ? AND source_numeric = ?",
                descriptor.link_table(field)
            );
            sqlx::query(&sql)
                .bind(owner_sql)
                .bind(numeric)
                .execute(&mut *conn)
                .await
                .map_err(|e| RepoError::transaction("delete_links", e))?;
        }

        if drop_inbound {
            for (source, field) in links_targeting(descriptor.prefix) {
                let sql = format!(
                    "DELETE FROM {} WHERE owner = ? AND target_numeric = ?",
                    source.link_table(field)
                );
                sqlx::query(&sql)
                    .bind(owner_sql)
                    .bind(numeric)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| RepoError::transaction("delete_inbound_links", e))?;
            }
        }

        let sql = format!(
            "DELETE FROM {} WHERE owner = ? AND numeric = ?",
            descriptor.table
        );
        sqlx::query(&sql)
            .bind(owner_sql)
            .bind(numeric)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepoError::transaction("delete_row", e))?;

        sqlx::query("DELETE FROM identifiers WHERE prefix = ? AND numeric = ? AND owner = ?")
            .bind(descriptor.prefix)
            .bind(numeric)
            .bind(owner_sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepoError::transaction("delete_identifier", e))?;

        removed.push(id.clone());
        Ok(())
    }
    .boxed()
}

/// Hydrate an object. Children are loaded recursively, links only as identifiers.
fn load_tree<'a>(
    conn: &'a mut SqliteConnection,
    descriptor: &'static TypeDescriptor,
    id: &'a ObjId,
    owner: OwnerId,
) -> BoxFuture<'a, Result<Option<Document>, RepoError>> {
    async move {
        if id.prefix != descriptor.prefix || !id.is_assigned() {
            return Ok(None);
        }
        let numeric = numeric_to_sql(id.numeric)?;
        let owner_sql = owner.get();

        let mut doc = {
            let columns: String = descriptor
                .scalars
                .iter()
                .map(|f| format!(", {}", f.name))
                .collect();
            let sql = format!(
                "SELECT numeric{columns} FROM {} WHERE owner = ? AND numeric = ?",
                descriptor.table
            );
            let row = sqlx::query(&sql)
                .bind(owner_sql)
                .bind(numeric)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| RepoError::transaction("load_row", e))?;
            let Some(row) = row else {
                return Ok(None);
            };

            let mut doc = Document::new();
            set_document_obj_id(&mut doc, id);
            for field in descriptor.scalars {
                doc.insert(field.name.to_string(), decode_scalar(&row, field)?);
            }
            doc
        };

        for field in descriptor.maps {
            let sql = format!(
                "SELECT key, value FROM {} WHERE owner = ? AND numeric = ? ORDER BY key",
                descriptor.map_table(field)
            );
            let entries: Vec<(String, String)> = sqlx::query_as(&sql)
                .bind(owner_sql)
                .bind(numeric)
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| RepoError::transaction("load_map", e))?;
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key, decode_map_value(&value)?);
            }
            doc.insert(field.name.to_string(), Value::Object(map));
        }

        for field in descriptor.children {
            let mut items = Vec::new();
            let child_rows = child_numerics(&mut *conn, descriptor, numeric, field, owner).await?;
            for child_numeric in child_rows {
                let child_id = ObjId::new(field.child.prefix, numeric_from_sql(child_numeric)?);
                let child = load_tree(&mut *conn, field.child, &child_id, owner)
                    .await?
                    .ok_or_else(|| {
                        RepoError::serialization(format!("{id} lists missing child {child_id}"))
                    })?;
                items.push(Value::Object(child));
            }
            doc.insert(field.name.to_string(), Value::Array(items));
        }

        for field in descriptor.links {
            let sql = format!(
                "SELECT target_numeric FROM {} WHERE owner = ? AND source_numeric = ? \
                 ORDER BY target_numeric",
                descriptor.link_table(field)
            );
            let targets: Vec<i64> = sqlx::query_scalar(&sql)
                .bind(owner_sql)
                .bind(numeric)
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| RepoError::transaction("load_links", e))?;
            doc.insert(field.name.to_string(), decode_links(field, targets)?);
        }

        Ok(Some(doc))
    }
    .boxed()
}

async fn list_roots(
    conn: &mut SqliteConnection,
    descriptor: &TypeDescriptor,
    owner: OwnerId,
) -> Result<Vec<ObjId>, RepoError> {
    let sql = format!(
        "SELECT t.numeric FROM {} t WHERE t.owner = ? AND NOT EXISTS (\
         SELECT 1 FROM child_ownership c \
         WHERE c.owner = t.owner AND c.child_prefix = ? AND c.child_numeric = t.numeric) \
         ORDER BY t.numeric",
        descriptor.table
    );
    let numerics: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(owner.get())
        .bind(descriptor.prefix)
        .fetch_all(conn)
        .await
        .map_err(|e| RepoError::transaction("list_roots", e))?;

    numerics
        .into_iter()
        .map(|n| Ok::<_, RepoError>(ObjId::new(descriptor.prefix, numeric_from_sql(n)?)))
        .collect()
}
