// Picture rotation
// Cycles through a plant's pictures on a fixed interval while its camera is closed

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::state::{Picture, PlantId};

/// Picture to show at a given tick, `None` when there are no pictures yet
pub fn current_picture(pictures: &[Picture], tick: u64) -> Option<&Picture> {
    if pictures.is_empty() {
        return None;
    }
    let index = (tick % pictures.len() as u64) as usize;
    pictures.get(index)
}

/// Fixed-interval tick counter running on the tokio runtime.
///
/// The timer belongs to this value: dropping it cancels the task.
pub struct RotationTask {
    ticks: watch::Receiver<u64>,
    handle: JoinHandle<()>,
}

impl RotationTask {
    pub fn spawn(period: Duration) -> Self {
        Self::spawn_with(period, |_| {})
    }

    /// Start ticking, calling `on_tick` with the new tick after each interval
    pub fn spawn_with<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        let (tx, ticks) = watch::channel(0u64);

        let handle = tokio::spawn(async move {
            let mut timer = time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut tick = 0u64;
            loop {
                timer.tick().await;
                tick = tick.wrapping_add(1);
                tx.send_replace(tick);
                on_tick(tick);
            }
        });

        Self { ticks, handle }
    }

    pub fn tick(&self) -> u64 {
        *self.ticks.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.ticks.clone()
    }
}

impl Drop for RotationTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type TickListener = Arc<dyn Fn(PlantId, u64) + Send + Sync>;

/// One rotation per displayed plant whose camera is not open
pub struct Rotations {
    period: Duration,
    listener: TickListener,
    tasks: HashMap<PlantId, RotationTask>,
}

impl Rotations {
    pub fn new<F>(period: Duration, listener: F) -> Self
    where
        F: Fn(PlantId, u64) + Send + Sync + 'static,
    {
        Self {
            period,
            listener: Arc::new(listener),
            tasks: HashMap::new(),
        }
    }

    /// Match running timers to what is on screen.
    ///
    /// Starts a timer for each displayed, unselected plant that lacks one and
    /// cancels timers for plants that went away or had their camera opened.
    pub fn sync(&mut self, displayed: &[PlantId], selected: Option<PlantId>) {
        self.tasks
            .retain(|id, _| displayed.contains(id) && selected != Some(*id));

        for &id in displayed {
            if selected == Some(id) || self.tasks.contains_key(&id) {
                continue;
            }
            let listener = Arc::clone(&self.listener);
            let task = RotationTask::spawn_with(self.period, move |tick| listener(id, tick));
            self.tasks.insert(id, task);
        }
    }

    pub fn tick(&self, id: PlantId) -> Option<u64> {
        self.tasks.get(&id).map(RotationTask::tick)
    }

    pub fn is_rotating(&self, id: PlantId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn pictures(n: usize) -> Vec<Picture> {
        (0..n)
            .map(|i| Picture {
                taken_at: Utc.timestamp_opt(i as i64, 0).unwrap(),
                data: format!("picture {}", i),
            })
            .collect()
    }

    #[test]
    fn test_empty_has_no_picture() {
        assert!(current_picture(&[], 0).is_none());
        assert!(current_picture(&[], 17).is_none());
    }

    #[test]
    fn test_cycles_in_insertion_order() {
        let pics = pictures(4);
        let shown: Vec<&str> = (0..8)
            .map(|tick| current_picture(&pics, tick).unwrap().data.as_str())
            .collect();
        assert_eq!(
            shown,
            vec![
                "picture 0", "picture 1", "picture 2", "picture 3",
                "picture 0", "picture 1", "picture 2", "picture 3",
            ]
        );
    }

    #[test]
    fn test_visits_all_before_repeating() {
        for n in 1..=7 {
            let pics = pictures(n);
            let mut seen: Vec<&str> = Vec::new();
            for tick in 0..n as u64 {
                let data = current_picture(&pics, tick).unwrap().data.as_str();
                assert!(!seen.contains(&data));
                seen.push(data);
            }
            assert_eq!(seen.len(), n);
            assert_eq!(current_picture(&pics, n as u64).unwrap().data, "picture 0");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_ticks_on_interval() {
        let task = RotationTask::spawn(Duration::from_secs(1));
        let mut ticks = task.subscribe();
        assert_eq!(task.tick(), 0);

        for expected in 1..=3 {
            ticks.changed().await.unwrap();
            assert_eq!(*ticks.borrow(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let task = RotationTask::spawn(Duration::from_secs(1));
        let mut ticks = task.subscribe();
        ticks.changed().await.unwrap();

        drop(task);
        // The sender lives in the aborted task
        assert!(ticks.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_receives_plant_ticks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut rotations = Rotations::new(Duration::from_millis(1000), move |id, tick| {
            sink.lock().unwrap().push((id, tick));
        });

        rotations.sync(&[7], None);
        time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(*seen.lock().unwrap(), vec![(7, 1), (7, 2)]);
        assert_eq!(rotations.tick(7), Some(2));
    }

    #[tokio::test]
    async fn test_sync_skips_selected_and_removed() {
        let mut rotations = Rotations::new(Duration::from_secs(1), |_, _| {});

        rotations.sync(&[1, 2, 3], Some(2));
        assert!(rotations.is_rotating(1));
        assert!(!rotations.is_rotating(2));
        assert!(rotations.is_rotating(3));

        rotations.sync(&[1, 2], None);
        assert_eq!(rotations.len(), 2);
        assert!(rotations.is_rotating(2));
        assert!(!rotations.is_rotating(3));

        rotations.clear();
        assert!(rotations.is_empty());
    }
}
