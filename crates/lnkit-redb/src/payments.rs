//! Redb payment store

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use lnkit_common::database::{self, PaymentDatabase, PaymentFilter, PaymentTransition};
use lnkit_common::{MpPayment, PaymentHash};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::instrument;

use crate::error::Error;

// Payment hash => json MpPayment
const PAYMENTS_TABLE: TableDefinition<&[u8; 32], &str> = TableDefinition::new("payments");
const CONFIG_TABLE: TableDefinition<&str, &str> = TableDefinition::new("config");

const DATABASE_VERSION: u32 = 0;

/// Payment store backed by redb.
///
/// redb admits one write transaction at a time, so every update of a payment
/// observes all updates committed before it.
#[derive(Clone)]
pub struct PaymentRedbDatabase {
    db: Arc<Database>,
}

impl fmt::Debug for PaymentRedbDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentRedbDatabase").finish_non_exhaustive()
    }
}

impl PaymentRedbDatabase {
    /// Open or create a database file at `path`
    pub fn new(path: &Path) -> Result<Self, Error> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Create a database held entirely in memory
    pub fn in_memory() -> Result<Self, Error> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, Error> {
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(CONFIG_TABLE)?;

            let db_version = table.get("db_version")?.map(|v| v.value().to_string());

            match db_version {
                Some(db_version) => {
                    let current_file_version = db_version.parse::<u32>()?;
                    if current_file_version != DATABASE_VERSION {
                        tracing::warn!(
                            "Database version {} does not match expected {}",
                            current_file_version,
                            DATABASE_VERSION
                        );
                        return Err(Error::UnknownDatabaseVersion(current_file_version));
                    }
                }
                None => {
                    tracing::debug!("Creating new payment database");
                    table.insert("db_version", DATABASE_VERSION.to_string().as_str())?;
                }
            }

            // Create the payments table up front so reads never miss it
            let _ = write_txn.open_table(PAYMENTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl PaymentDatabase for PaymentRedbDatabase {
    #[instrument(skip(self))]
    async fn get_payment(
        &self,
        payment_hash: &PaymentHash,
    ) -> Result<Option<MpPayment>, database::Error> {
        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn.open_table(PAYMENTS_TABLE).map_err(Error::from)?;

        let payment = match table.get(payment_hash.as_bytes()).map_err(Error::from)? {
            Some(payment) => Some(serde_json::from_str(payment.value())?),
            None => None,
        };

        Ok(payment)
    }

    #[instrument(skip_all)]
    async fn get_payments(&self) -> Result<Vec<MpPayment>, database::Error> {
        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn.open_table(PAYMENTS_TABLE).map_err(Error::from)?;

        let mut payments = Vec::new();
        for entry in table.iter().map_err(Error::from)? {
            let (_, payment) = entry.map_err(Error::from)?;
            payments.push(serde_json::from_str(payment.value())?);
        }

        Ok(payments)
    }

    #[instrument(skip(self, transition))]
    async fn update_payment(
        &self,
        payment_hash: &PaymentHash,
        transition: PaymentTransition,
    ) -> Result<MpPayment, lnkit_common::Error> {
        let db = Arc::clone(&self.db);
        let payment_hash = *payment_hash;

        // begin_write parks the thread until the previous writer commits
        tokio::task::spawn_blocking(move || write_payment(&db, &payment_hash, transition))
            .await
            .map_err(Error::from)?
    }

    #[instrument(skip_all)]
    async fn remove_payments(&self, filter: PaymentFilter) -> Result<usize, database::Error> {
        let db = Arc::clone(&self.db);

        let removed = tokio::task::spawn_blocking(move || remove_matching(&db, filter))
            .await
            .map_err(Error::from)??;

        tracing::debug!("Removed {} payments", removed);

        Ok(removed)
    }
}

fn write_payment(
    db: &Database,
    payment_hash: &PaymentHash,
    transition: PaymentTransition,
) -> Result<MpPayment, lnkit_common::Error> {
    let write_txn = db.begin_write().map_err(Error::from)?;

    let updated = {
        let mut table = write_txn.open_table(PAYMENTS_TABLE).map_err(Error::from)?;

        let current: Option<MpPayment> = match table
            .get(payment_hash.as_bytes())
            .map_err(Error::from)?
        {
            Some(payment) => {
                Some(serde_json::from_str(payment.value()).map_err(database::Error::from)?)
            }
            None => None,
        };

        // Dropping the transaction without commit aborts it
        let updated = transition(current)?;

        if updated.payment_hash() != payment_hash {
            return Err(database::Error::MismatchedKey(*payment_hash).into());
        }

        let json = serde_json::to_string(&updated).map_err(database::Error::from)?;
        table
            .insert(payment_hash.as_bytes(), json.as_str())
            .map_err(Error::from)?;

        updated
    };

    write_txn.commit().map_err(Error::from)?;

    Ok(updated)
}

fn remove_matching(db: &Database, filter: PaymentFilter) -> Result<usize, database::Error> {
    let write_txn = db.begin_write().map_err(Error::from)?;

    let removed = {
        let mut table = write_txn.open_table(PAYMENTS_TABLE).map_err(Error::from)?;

        let mut to_remove = Vec::new();
        for entry in table.iter().map_err(Error::from)? {
            let (payment_hash, payment) = entry.map_err(Error::from)?;
            let payment: MpPayment = serde_json::from_str(payment.value())?;
            if filter(&payment) {
                to_remove.push(*payment_hash.value());
            }
        }

        for payment_hash in &to_remove {
            table.remove(payment_hash).map_err(Error::from)?;
        }

        to_remove.len()
    };

    write_txn.commit().map_err(Error::from)?;

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use rand::{thread_rng, RngCore};
    use lnkit_common::{MilliSatoshi, PaymentCreationInfo, PaymentStatus, Preimage};

    use super::*;

    fn test_payment() -> MpPayment {
        let mut preimage = [0u8; 32];
        thread_rng().fill_bytes(&mut preimage);

        MpPayment::new(PaymentCreationInfo {
            payment_hash: Preimage::new(preimage).hash(),
            value: MilliSatoshi::from(1),
            creation_time: 1_700_000_000,
            payment_request: b"hola".to_vec(),
        })
    }

    fn insert(payment: MpPayment) -> PaymentTransition {
        Box::new(move |_| Ok(payment))
    }

    #[tokio::test]
    async fn test_update_and_get() {
        let db = PaymentRedbDatabase::in_memory().unwrap();
        let payment = test_payment();
        let hash = *payment.payment_hash();

        assert!(db.get_payment(&hash).await.unwrap().is_none());

        let stored = db.update_payment(&hash, insert(payment.clone())).await.unwrap();
        assert_eq!(stored, payment);
        assert_eq!(db.get_payment(&hash).await.unwrap(), Some(payment));
    }

    #[tokio::test]
    async fn test_failed_transition_leaves_record_untouched() {
        let db = PaymentRedbDatabase::in_memory().unwrap();
        let payment = test_payment();
        let hash = *payment.payment_hash();
        db.update_payment(&hash, insert(payment.clone())).await.unwrap();

        let result = db
            .update_payment(
                &hash,
                Box::new(|current| {
                    assert!(current.is_some());
                    Err(lnkit_common::Error::PaymentInFlight)
                }),
            )
            .await;
        assert!(matches!(result, Err(lnkit_common::Error::PaymentInFlight)));

        assert_eq!(db.get_payment(&hash).await.unwrap(), Some(payment));
    }

    #[tokio::test]
    async fn test_rejects_record_under_wrong_key() {
        let db = PaymentRedbDatabase::in_memory().unwrap();
        let payment = test_payment();
        let other = test_payment();

        let result = db
            .update_payment(other.payment_hash(), insert(payment))
            .await;
        assert!(matches!(
            result,
            Err(lnkit_common::Error::Database(
                database::Error::MismatchedKey(_)
            ))
        ));
        assert!(db.get_payments().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_contended_writers() {
        let db = PaymentRedbDatabase::in_memory().unwrap();
        let payment = test_payment();
        let hash = *payment.payment_hash();
        db.update_payment(&hash, insert(payment)).await.unwrap();

        // More writers than worker threads
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.update_payment(
                        &hash,
                        Box::new(|current| {
                            let mut payment =
                                current.ok_or(lnkit_common::Error::PaymentNotInitiated)?;
                            payment.info.creation_time += 1;
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Ok(payment)
                        }),
                    )
                    .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let payment = db.get_payment(&hash).await.unwrap().unwrap();
        assert_eq!(payment.info.creation_time, 1_700_000_016);
    }

    #[tokio::test]
    async fn test_remove_payments_with_filter() {
        let db = PaymentRedbDatabase::in_memory().unwrap();

        let mut failed = test_payment();
        failed.failure_reason = Some(lnkit_common::FailureReason::NoRoute);
        let in_flight = test_payment();

        for payment in [failed.clone(), in_flight.clone()] {
            let hash = *payment.payment_hash();
            db.update_payment(&hash, insert(payment)).await.unwrap();
        }

        let removed = db
            .remove_payments(Box::new(|payment: &MpPayment| {
                payment.status() != PaymentStatus::InFlight
            }))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = db.get_payments().await.unwrap();
        assert_eq!(remaining, vec![in_flight]);
    }

    #[tokio::test]
    async fn test_version_check_on_reopen() {
        let mut suffix = [0u8; 8];
        thread_rng().fill_bytes(&mut suffix);
        let path = std::env::temp_dir().join(format!(
            "lnkit-redb-test-{}.redb",
            u64::from_be_bytes(suffix)
        ));

        {
            let db = PaymentRedbDatabase::new(&path).unwrap();
            let payment = test_payment();
            let hash = *payment.payment_hash();
            db.update_payment(&hash, insert(payment)).await.unwrap();
        }

        // Reopening keeps the data
        {
            let db = PaymentRedbDatabase::new(&path).unwrap();
            assert_eq!(db.get_payments().await.unwrap().len(), 1);
        }

        // Bump the stored version behind the store's back
        {
            let db = Database::create(&path).unwrap();
            let write_txn = db.begin_write().unwrap();
            {
                let mut table = write_txn.open_table(CONFIG_TABLE).unwrap();
                table.insert("db_version", "99").unwrap();
            }
            write_txn.commit().unwrap();
        }

        assert!(matches!(
            PaymentRedbDatabase::new(&path),
            Err(Error::UnknownDatabaseVersion(99))
        ));

        std::fs::remove_file(&path).unwrap();
    }
}
