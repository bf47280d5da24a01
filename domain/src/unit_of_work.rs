//! Running business writes so that their events are published only after the
//! writes are durable.
//!
//! ```rust,ignore
//! unit_of_work::transact(db, &publisher, |txn, pending| {
//!     Box::pin(async move {
//!         let comment = save_comment(txn, input).await?;
//!         pending.stage(DomainEvent::comment_created(
//!             post.author_id, comment.id, post.id, post.title, comment.content,
//!         ));
//!         Ok::<_, Error>(comment)
//!     })
//! })
//! .await?;
//! ```

use crate::error::Error;
use events::{EventPublisher, PendingEvents};
use log::*;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::future::Future;
use std::pin::Pin;

/// Runs `work` in a database transaction, then publishes the events it staged.
///
/// Events reach the publisher strictly after a successful commit. If `work`
/// fails the transaction is rolled back, and if the commit fails it never took
/// effect; in both cases the staged events are discarded unseen.
pub async fn transact<T, F>(
    db: &DatabaseConnection,
    publisher: &EventPublisher,
    work: F,
) -> Result<T, Error>
where
    T: Send,
    F: for<'c> FnOnce(
            &'c DatabaseTransaction,
            &'c mut PendingEvents,
        ) -> Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'c>>
        + Send,
{
    let txn = db.begin().await?;
    let mut pending = PendingEvents::new();

    let outcome = work(&txn, &mut pending).await;

    match outcome {
        Ok(value) => {
            txn.commit().await?;
            trace!("Committed, publishing {} staged event(s)", pending.len());
            publisher.publish_all(pending.into_events()).await;
            Ok(value)
        }
        Err(err) => {
            if !pending.is_empty() {
                debug!("Discarding {} staged event(s) after failure", pending.len());
            }
            if let Err(rollback_err) = txn.rollback().await {
                warn!("Rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}
