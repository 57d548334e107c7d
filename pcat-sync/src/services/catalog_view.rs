//! Read-side view of one stored entity
//!
//! Attaches on-read derived values (retail prices) and the entity's join
//! lists to its stored fields.

use pcat_common::EntityKind;
use serde_json::{json, Value};

use crate::error::StoreResult;
use crate::store::CatalogStore;

/// JSON view of one entity, or `None` if it does not exist
pub async fn entity_view<S: CatalogStore>(store: &S, kind: EntityKind, id: i64) -> StoreResult<Option<Value>> {
    let Some(entity) = store.find_by_id(kind, id).await? else {
        return Ok(None);
    };

    let mut view = entity.to_json();
    for join in kind.schema().joins {
        let targets = store.find_join_targets(join, id).await?;
        view[join.field] = json!(targets);
    }
    Ok(Some(view))
}
