//! Delete-all.

use tracing::{info, warn};

use crate::Result;
use crate::database::repositories::{DeleteStats, UserDataTxOps};
use crate::database::{WritePool, begin_immediate};

/// Delete every row of `namespace` in one write transaction.
///
/// Nothing is committed unless all four deletes succeed.
pub async fn delete_user_data(pool: &WritePool, namespace: &str) -> Result<DeleteStats> {
    let mut tx = begin_immediate(pool).await?;

    let stats = match UserDataTxOps::delete_all(&mut tx, namespace).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(namespace = %namespace, error = %e, "Failed to delete user data");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    namespace = %namespace,
                    error = %rollback_err,
                    "Failed to roll back delete"
                );
            }
            return Err(e);
        }
    };

    tx.commit().await?;

    info!(namespace = %namespace, ?stats, "Deleted user data");
    Ok(stats)
}
