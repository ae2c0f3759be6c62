//! End-to-end tests driving the public pool API.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use taskpool::{Pool, PoolError, TaskError, TaskOptions};

fn sleeper(ms: u64) -> TaskOptions {
    TaskOptions::new().task(move || async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok::<_, TaskError>(())
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn four_tasks_on_two_workers_run_in_two_waves() {
    let pool = Pool::new(2, 2);
    let group = pool.new_task_group(4);

    let start = Instant::now();
    for _ in 0..4 {
        pool.add_task(sleeper(50).auto_done().group(&group))
            .await
            .expect("submit");
    }
    group.wait().await;
    let elapsed = start.elapsed();

    // Two workers, four 50ms tasks: two waves of two.
    assert!(elapsed >= Duration::from_millis(95), "too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "too slow: {elapsed:?}");

    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submission_times_out_when_the_pool_is_saturated() {
    let pool = Pool::new(1, 1);
    let busy = pool.new_task_group(1);
    pool.add_task(sleeper(100).auto_done().group(&busy))
        .await
        .expect("busy task");

    let timed_out = Arc::new(AtomicBool::new(false));
    let group = pool.new_task_group(1);

    let start = Instant::now();
    let res = pool
        .add_task(
            sleeper(1)
                .wait_timeout(Duration::from_millis(10))
                .on_timeout({
                    let timed_out = timed_out.clone();
                    move || timed_out.store(true, Ordering::SeqCst)
                })
                .auto_done()
                .group(&group),
        )
        .await;
    let elapsed = start.elapsed();

    assert!(matches!(res, Err(PoolError::Timeout { .. })));
    assert!(timed_out.load(Ordering::SeqCst));
    assert!(elapsed >= Duration::from_millis(8), "too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(80), "too slow: {elapsed:?}");

    // Auto-done already released the group on the timeout path.
    group.wait().await;
    busy.wait().await;
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_task_is_contained_and_the_worker_survives() {
    let pool = Pool::new(1, 2);

    let completed = Arc::new(AtomicBool::new(false));
    let succeeded = Arc::new(AtomicBool::new(false));
    let seen_error = Arc::new(Mutex::new(String::new()));
    let reported = pool.new_task_group(1);

    pool.add_task(
        TaskOptions::new()
            .task(|| async { panic!("boom") })
            .on_success({
                let succeeded = succeeded.clone();
                move || succeeded.store(true, Ordering::SeqCst)
            })
            .on_complete({
                let completed = completed.clone();
                move || completed.store(true, Ordering::SeqCst)
            })
            .on_error({
                let seen_error = seen_error.clone();
                let reported = reported.clone();
                move |_handle, _group, err| async move {
                    *seen_error.lock().unwrap() = err.to_string();
                    reported.done();
                }
            }),
    )
    .await
    .expect("submit panicking task");

    reported.wait().await;
    assert!(completed.load(Ordering::SeqCst));
    assert!(!succeeded.load(Ordering::SeqCst));
    {
        let text = seen_error.lock().unwrap();
        assert!(text.contains("task panicked"), "got: {text}");
        assert!(text.contains("boom"), "got: {text}");
    }

    // The worker keeps accepting work after the contained panic.
    let group = pool.new_task_group(1);
    pool.add_task(sleeper(1).auto_done().group(&group))
        .await
        .expect("submit after panic");
    group.wait().await;

    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn err_reload_retries_until_success() {
    let pool = Pool::new(1, 2);
    let group = pool.new_task_group(1);

    let attempts = Arc::new(AtomicU32::new(0));
    let after_ok = Arc::new(AtomicBool::new(false));

    pool.add_task(
        TaskOptions::new()
            .task({
                let attempts = attempts.clone();
                move || {
                    let attempts = attempts.clone();
                    async move {
                        // Fails on the first two invocations, succeeds on the
                        // third (initial run + two retries).
                        if attempts.fetch_add(1, Ordering::SeqCst) + 1 < 3 {
                            Err(TaskError::fail("not yet"))
                        } else {
                            Ok(())
                        }
                    }
                }
            })
            .auto_done()
            .group(&group)
            .on_error({
                let after_ok = after_ok.clone();
                move |handle, _group, _err| async move {
                    handle
                        .err_reload(
                            3,
                            Some(Box::new(move |final_err| {
                                after_ok.store(final_err.is_none(), Ordering::SeqCst);
                            })),
                        )
                        .await;
                }
            }),
    )
    .await
    .expect("submit");

    group.wait().await;
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(after_ok.load(Ordering::SeqCst));

    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn group_wait_then_close_does_not_hang() {
    let pool = Pool::new(4, 4);
    let group = pool.new_task_group(10);

    for _ in 0..10 {
        pool.add_task(sleeper(5).auto_done().group(&group))
            .await
            .expect("submit");
    }
    group.wait().await;

    tokio::time::timeout(Duration::from_secs(5), pool.close())
        .await
        .expect("close hung");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn zero_wait_timeout_blocks_until_a_slot_frees() {
    let pool = Pool::new(1, 1);
    let group = pool.new_task_group(2);

    pool.add_task(sleeper(80).auto_done().group(&group))
        .await
        .expect("busy task");

    let start = Instant::now();
    pool.add_task(sleeper(1).auto_done().group(&group))
        .await
        .expect("blocked submit");
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(60), "did not block: {elapsed:?}");

    group.wait().await;
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn saturation_round_trip_settles_back_to_idle() {
    let pool = Pool::new(1, 1);
    let group = pool.new_task_group(5);

    for _ in 0..5 {
        pool.add_task(sleeper(10).auto_done().group(&group))
            .await
            .expect("submit");
    }
    group.wait().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let usage = pool.usage();
    assert_eq!(usage.workers.len(), 1);
    assert_eq!(usage.workers[0].executed, 5);
    assert_eq!(usage.workers[0].load, 0);

    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn success_callbacks_run_in_order() {
    let pool = Pool::new(1, 1);
    let group = pool.new_task_group(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    pool.add_task(
        TaskOptions::new()
            .task(|| async { Ok(()) })
            .auto_done()
            .group(&group)
            .on_success({
                let order = order.clone();
                move || order.lock().unwrap().push("success")
            })
            .on_complete({
                let order = order.clone();
                move || order.lock().unwrap().push("complete")
            }),
    )
    .await
    .expect("submit");

    group.wait().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*order.lock().unwrap(), vec!["success", "complete"]);

    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_runs_complete_before_error() {
    let pool = Pool::new(1, 1);
    let reported = pool.new_task_group(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    pool.add_task(
        TaskOptions::new()
            .task(|| async { Err(TaskError::fail("nope")) })
            .on_complete({
                let order = order.clone();
                move || order.lock().unwrap().push("complete")
            })
            .on_error({
                let order = order.clone();
                let reported = reported.clone();
                move |_handle, _group, _err| async move {
                    order.lock().unwrap().push("error");
                    reported.done();
                }
            }),
    )
    .await
    .expect("submit");

    reported.wait().await;
    assert_eq!(*order.lock().unwrap(), vec!["complete", "error"]);

    pool.close().await;
}
