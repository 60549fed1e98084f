//! Bounded per-segment worker pool.

use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};

use super::pipeline::CancelHandle;

/// Run `task` for segments `0..count` on a rayon pool of at most
/// `max_parallel` threads.
///
/// Every task receives a child of `cancel`. With `fail_fast`, the first
/// failure cancels that child, so unstarted segments are skipped and
/// collaborators watching the handle stop their running work.
///
/// Slot `i` of the result holds the outcome for segment `i`, or `None` when
/// the segment did not complete: it never started, or it failed after
/// cancellation was requested.
pub(crate) fn for_each_segment<T, E, F>(
    count: usize,
    max_parallel: usize,
    cancel: &CancelHandle,
    fail_fast: bool,
    task: F,
) -> Result<Vec<Option<Result<T, E>>>, ThreadPoolBuildError>
where
    T: Send,
    E: Send,
    F: Fn(usize, &CancelHandle) -> Result<T, E> + Sync,
{
    if count == 0 {
        return Ok(Vec::new());
    }

    let abort = cancel.child();
    let pool = ThreadPoolBuilder::new()
        .num_threads(max_parallel.clamp(1, count))
        .thread_name(|i| format!("narrsync-segment-{}", i))
        .build()?;

    Ok(pool.install(|| {
        (0..count)
            .into_par_iter()
            .map(|index| {
                if abort.is_cancelled() {
                    return None;
                }
                match task(index, &abort) {
                    Ok(value) => Some(Ok(value)),
                    Err(_) if abort.is_cancelled() => None,
                    Err(e) => {
                        if fail_fast {
                            abort.cancel();
                        }
                        Some(Err(e))
                    }
                }
            })
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn runs_every_segment_in_slot_order() {
        let cancel = CancelHandle::new();
        let results = for_each_segment(10, 3, &cancel, true, |i, _| Ok::<_, String>(i * 2)).unwrap();

        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
        assert_eq!(values, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn bounded_concurrency() {
        let cancel = CancelHandle::new();
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        for_each_segment(12, 2, &cancel, false, |_, _| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, ()>(())
        })
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn fail_fast_stops_unstarted_work() {
        let cancel = CancelHandle::new();
        let results = for_each_segment(20, 1, &cancel, true, |i, _| {
            if i == 2 {
                Err("boom")
            } else {
                Ok(i)
            }
        })
        .unwrap();

        assert!(results[1].as_ref().unwrap().is_ok());
        assert!(results[2].as_ref().unwrap().is_err());
        assert!(results[3..].iter().all(Option::is_none));
        // The job's own handle is left alone
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn failure_cancels_running_siblings() {
        let cancel = CancelHandle::new();
        let started = Instant::now();
        let results = for_each_segment(2, 2, &cancel, true, |i, abort| {
            if i == 0 {
                thread::sleep(Duration::from_millis(20));
                return Err("boom");
            }
            while !abort.is_cancelled() {
                if started.elapsed() > Duration::from_secs(5) {
                    return Ok(i);
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err("cancelled")
        })
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(results[0], Some(Err("boom")));
        assert_eq!(results[1], None);
    }

    #[test]
    fn keeps_going_without_fail_fast() {
        let cancel = CancelHandle::new();
        let results =
            for_each_segment(5, 2, &cancel, false, |i, _| if i == 0 { Err(()) } else { Ok(i) }).unwrap();
        assert!(results.iter().all(Option::is_some));
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let results = for_each_segment(4, 4, &cancel, true, |i, _| Ok::<_, ()>(i)).unwrap();
        assert!(results.iter().all(Option::is_none));
    }
}
