//! High-level service holding the latest schedule snapshot for one address.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::model::{Address, DateRange, ScheduleSnapshot, WasteDay};
use crate::ports::{AddressPort, PortError, SchedulePort};

/// Public entry point for refreshing and reading the schedule of one address.
///
/// The held snapshot is only ever replaced as a whole, and only by a
/// successful run.
pub struct ScheduleService {
    address: Address,
    address_port: Arc<dyn AddressPort>,
    schedule_port: Arc<dyn SchedulePort>,
    snapshot: RwLock<Option<Arc<ScheduleSnapshot>>>,
}

impl ScheduleService {
    /// Create a new service for `address` bound to the provided ports.
    #[must_use]
    pub fn new(
        address: Address,
        address_port: Arc<dyn AddressPort>,
        schedule_port: Arc<dyn SchedulePort>,
    ) -> Self {
        Self {
            address,
            address_port,
            schedule_port,
            snapshot: RwLock::new(None),
        }
    }

    /// Address this service acquires schedules for.
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Latest successfully acquired snapshot, if any.
    pub async fn snapshot(&self) -> Option<Arc<ScheduleSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Run one acquisition and swap in its snapshot.
    ///
    /// # Errors
    ///
    /// Returns the run's [`PortError`]. The previously held snapshot is left
    /// untouched in that case.
    pub async fn refresh(&self) -> Result<Arc<ScheduleSnapshot>, PortError> {
        match self.schedule_port.snapshot(&self.address).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                info!(
                    address = %self.address,
                    days = snapshot.len(),
                    "schedule snapshot refreshed"
                );
                *self.snapshot.write().await = Some(Arc::clone(&snapshot));
                Ok(snapshot)
            }
            Err(err) => {
                warn!(address = %self.address, error = %err, "schedule refresh failed, keeping previous snapshot");
                Err(err)
            }
        }
    }

    /// Whether the portal accepts this service's address.
    pub async fn validate_address(&self) -> bool {
        self.address_port.validate(&self.address).await
    }

    /// Pickup days of the held snapshot within `range`.
    pub async fn events_in(&self, range: DateRange) -> Vec<WasteDay> {
        self.snapshot()
            .await
            .map(|snapshot| snapshot.events_in(range).cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::ports::{ParseError, Step};

    /// Replays a scripted list of run outcomes.
    struct ScriptedPort {
        outcomes: Mutex<VecDeque<Result<ScheduleSnapshot, PortError>>>,
    }

    impl ScriptedPort {
        fn new(outcomes: Vec<Result<ScheduleSnapshot, PortError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
            })
        }
    }

    #[async_trait]
    impl SchedulePort for ScriptedPort {
        async fn snapshot(&self, _address: &Address) -> Result<ScheduleSnapshot, PortError> {
            self.outcomes
                .lock()
                .expect("outcome lock")
                .pop_front()
                .expect("no scripted outcome left")
        }
    }

    #[async_trait]
    impl AddressPort for ScriptedPort {
        async fn validate(&self, _address: &Address) -> bool {
            true
        }
    }

    fn snapshot_with(day: u32, label: &str) -> ScheduleSnapshot {
        ScheduleSnapshot::new(vec![WasteDay {
            date: NaiveDate::from_ymd_opt(2026, 1, day).expect("valid test date"),
            waste_types: vec![label.to_owned()],
        }])
    }

    fn service(port: &Arc<ScriptedPort>) -> ScheduleService {
        ScheduleService::new(
            Address::new("Geel", "Markt"),
            Arc::clone(port) as Arc<dyn AddressPort>,
            Arc::clone(port) as Arc<dyn SchedulePort>,
        )
    }

    #[tokio::test]
    async fn starts_without_snapshot() {
        let port = ScriptedPort::new(Vec::new());
        assert!(service(&port).snapshot().await.is_none(), "nothing fetched yet");
    }

    #[tokio::test]
    async fn successful_refresh_replaces_snapshot() {
        let port = ScriptedPort::new(vec![
            Ok(snapshot_with(5, "Papier")),
            Ok(snapshot_with(6, "Glas")),
        ]);
        let service = service(&port);

        service.refresh().await.expect("first refresh");
        service.refresh().await.expect("second refresh");

        let held = service.snapshot().await.expect("snapshot held");
        assert_eq!(held.as_ref(), &snapshot_with(6, "Glas"));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let port = ScriptedPort::new(vec![
            Ok(snapshot_with(5, "Papier")),
            Err(PortError::protocol(Step::StreetSelection, "unexpected HTTP status 500")),
            Err(PortError::Parse(ParseError::MissingCalendar)),
        ]);
        let service = service(&port);

        let before = service.refresh().await.expect("first refresh");
        assert!(service.refresh().await.is_err(), "protocol failure must surface");
        assert!(service.refresh().await.is_err(), "parse failure must surface");

        let held = service.snapshot().await.expect("snapshot still held");
        assert!(Arc::ptr_eq(&before, &held), "failed runs must not touch the snapshot");
    }

    #[tokio::test]
    async fn events_in_reads_the_held_snapshot() {
        let port = ScriptedPort::new(vec![Ok(snapshot_with(5, "Papier"))]);
        let service = service(&port);
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"),
            end: NaiveDate::from_ymd_opt(2026, 1, 31).expect("valid date"),
        };

        assert!(service.events_in(range).await.is_empty(), "no snapshot yet");
        service.refresh().await.expect("refresh");
        assert_eq!(service.events_in(range).await.len(), 1);
    }
}
