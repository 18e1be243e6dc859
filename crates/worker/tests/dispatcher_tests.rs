use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use summary_core::{
    DistributedLock, MessageChannel, SchedulerError, SchedulerResult, SummaryGenerator, SummaryKind,
    SummaryPeriod, SummaryRepository, WorkUnit,
};
use summary_infrastructure::{InMemoryChannel, InMemoryLock, MetricsCollector};
use summary_testing_utils::{
    date, GatedGenerator, MockSummaryGenerator, MockSummaryRepository, TestEnv, WorkMessageBuilder,
};
use summary_worker::{DispatcherSettings, ProcessOutcome, SummaryDispatcher};
use tokio::sync::broadcast;

const CHANNEL: &str = "summary_jobs";

struct CrashingGenerator;

#[async_trait]
impl SummaryGenerator for CrashingGenerator {
    async fn generate(&self, _content: &str) -> SchedulerResult<String> {
        panic!("generator crashed")
    }
}

fn settings(max_concurrent_jobs: usize) -> DispatcherSettings {
    DispatcherSettings::new(CHANNEL, max_concurrent_jobs)
        .unwrap()
        .with_lock_ttl(Duration::from_secs(60))
        .unwrap()
        .with_resubscribe_delay(Duration::from_millis(20))
        .unwrap()
}

fn dispatcher(
    lock: Arc<dyn DistributedLock>,
    channel: Arc<dyn MessageChannel>,
    generator: Arc<dyn SummaryGenerator>,
    repository: &MockSummaryRepository,
    settings: DispatcherSettings,
) -> Arc<SummaryDispatcher> {
    Arc::new(SummaryDispatcher::new(
        lock,
        channel,
        generator,
        Arc::new(repository.clone()) as Arc<dyn SummaryRepository>,
        settings,
        Arc::new(MetricsCollector::new()),
    ))
}

fn repository_with_diary(user_id: i64) -> MockSummaryRepository {
    let repository = MockSummaryRepository::new();
    repository.opt_in(user_id, SummaryKind::Daily);
    repository.add_diary(user_id, date(2024, 1, 15), "walked along the river");
    repository
}

#[tokio::test]
async fn test_completed_job_saves_summary_and_releases_lock() {
    let repository = repository_with_diary(1);
    let lock = Arc::new(InMemoryLock::new());
    let mut generator = MockSummaryGenerator::new();
    generator
        .expect_generate()
        .withf(|content| content.contains("walked along the river"))
        .times(1)
        .returning(|_| Ok("A quiet walk.".to_string()));

    let dispatcher = dispatcher(
        lock.clone(),
        Arc::new(InMemoryChannel::new()),
        Arc::new(generator),
        &repository,
        settings(1),
    );
    let message = WorkMessageBuilder::new().with_user(1).daily(2024, 1, 15);

    let outcome = dispatcher.handle_payload(&message.payload()).await.unwrap();

    assert_eq!(outcome, ProcessOutcome::Completed);
    assert_eq!(
        repository.summary_for(&message.unit()).as_deref(),
        Some("A quiet walk.")
    );
    assert!(!lock.is_held(&message.unit().lock_key()).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_delivery_generates_once() {
    let repository = repository_with_diary(1);
    let lock: Arc<dyn DistributedLock> = Arc::new(InMemoryLock::new());
    let generator = Arc::new(GatedGenerator::new());
    let channel: Arc<dyn MessageChannel> = Arc::new(InMemoryChannel::new());

    let first = dispatcher(lock.clone(), channel.clone(), generator.clone(), &repository, settings(1));
    let second = dispatcher(lock.clone(), channel, generator.clone(), &repository, settings(1));
    let payload = WorkMessageBuilder::new().with_user(1).daily(2024, 1, 15).payload();

    let first_payload = payload.clone();
    let first_run = tokio::spawn(async move { first.handle_payload(&first_payload).await });
    let generator_ref = &generator;
    assert!(
        TestEnv::wait_for(move || async move { generator_ref.calls() == 1 }, Duration::from_secs(5))
            .await
    );

    // 第一条仍在生成中，重复投递拿不到锁
    let outcome = second.handle_payload(&payload).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Skipped);

    generator.open(1);
    assert_eq!(first_run.await.unwrap().unwrap(), ProcessOutcome::Completed);
    assert_eq!(generator.calls(), 1);
    assert_eq!(repository.summary_count(), 1);
}

#[tokio::test]
async fn test_generation_failure_releases_lock_without_saving() {
    let repository = repository_with_diary(1);
    let lock = Arc::new(InMemoryLock::new());
    let mut generator = MockSummaryGenerator::new();
    generator
        .expect_generate()
        .times(1)
        .returning(|_| Err(SchedulerError::Generation("upstream timeout".to_string())));

    let dispatcher = dispatcher(
        lock.clone(),
        Arc::new(InMemoryChannel::new()),
        Arc::new(generator),
        &repository,
        settings(1),
    );
    let message = WorkMessageBuilder::new().with_user(1).daily(2024, 1, 15);

    let err = dispatcher.handle_payload(&message.payload()).await.unwrap_err();

    assert!(matches!(err, SchedulerError::Generation(_)));
    assert!(!lock.is_held(&message.unit().lock_key()).await.unwrap());
    assert_eq!(repository.summary_count(), 0);
}

#[tokio::test]
async fn test_save_failure_releases_lock() {
    let repository = repository_with_diary(1);
    repository.set_fail_saves(true);
    let lock = Arc::new(InMemoryLock::new());
    let mut generator = MockSummaryGenerator::new();
    generator
        .expect_generate()
        .returning(|_| Ok("summary".to_string()));

    let dispatcher = dispatcher(
        lock.clone(),
        Arc::new(InMemoryChannel::new()),
        Arc::new(generator),
        &repository,
        settings(1),
    );
    let message = WorkMessageBuilder::new().with_user(1).daily(2024, 1, 15);

    assert!(dispatcher.handle_payload(&message.payload()).await.is_err());
    assert!(!lock.is_held(&message.unit().lock_key()).await.unwrap());
}

#[tokio::test]
async fn test_undecodable_payload_is_an_error() {
    let repository = MockSummaryRepository::new();
    let mut generator = MockSummaryGenerator::new();
    generator.expect_generate().never();

    let dispatcher = dispatcher(
        Arc::new(InMemoryLock::new()),
        Arc::new(InMemoryChannel::new()),
        Arc::new(generator),
        &repository,
        settings(1),
    );

    for payload in [&b"not json"[..], &b"\xff\xfe"[..], &br#"{"type":"daily_summary"}"#[..]] {
        let err = dispatcher.handle_payload(payload).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Serialization(_)));
    }
}

#[tokio::test]
async fn test_unknown_message_type_is_ignored() {
    let repository = MockSummaryRepository::new();
    let mut generator = MockSummaryGenerator::new();
    generator.expect_generate().never();

    let dispatcher = dispatcher(
        Arc::new(InMemoryLock::new()),
        Arc::new(InMemoryChannel::new()),
        Arc::new(generator),
        &repository,
        settings(1),
    );

    let outcome = dispatcher
        .handle_payload(br#"{"type":"weekly_summary","user_id":1,"week":3}"#)
        .await
        .unwrap();
    assert_eq!(outcome, ProcessOutcome::Ignored);
}

#[tokio::test]
async fn test_missing_source_content_skips_generation() {
    let repository = MockSummaryRepository::new();
    let lock = Arc::new(InMemoryLock::new());
    let mut generator = MockSummaryGenerator::new();
    generator.expect_generate().never();

    let dispatcher = dispatcher(
        lock.clone(),
        Arc::new(InMemoryChannel::new()),
        Arc::new(generator),
        &repository,
        settings(1),
    );
    let message = WorkMessageBuilder::new().with_user(9).monthly(2024, 2);

    let outcome = dispatcher.handle_payload(&message.payload()).await.unwrap();

    assert_eq!(outcome, ProcessOutcome::NoContent);
    assert!(!lock.is_held(&message.unit().lock_key()).await.unwrap());
}

#[tokio::test]
async fn test_run_respects_concurrency_bound() {
    let repository = MockSummaryRepository::new();
    for day in 1..=6 {
        repository.add_diary(1, date(2024, 1, day), "entry");
    }
    let channel = Arc::new(InMemoryChannel::new());
    let generator = Arc::new(GatedGenerator::new());
    let dispatcher = dispatcher(
        Arc::new(InMemoryLock::new()),
        channel.clone(),
        generator.clone(),
        &repository,
        settings(2),
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let run = tokio::spawn(Arc::clone(&dispatcher).run(shutdown_rx));
    let channel_ref = &channel;
    assert!(
        TestEnv::wait_for(
            move || async move { channel_ref.subscriber_count(CHANNEL) == 1 },
            Duration::from_secs(5),
        )
        .await
    );

    for day in 1..=6 {
        let payload = WorkMessageBuilder::new().with_user(1).daily(2024, 1, day).payload();
        channel
            .publish(CHANNEL, std::str::from_utf8(&payload).unwrap())
            .await
            .unwrap();
    }

    let generator_ref = &generator;
    assert!(
        TestEnv::wait_for(move || async move { generator_ref.in_flight() == 2 }, Duration::from_secs(5))
            .await
    );
    // 饱和时不会开始第三个
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(generator.calls(), 2);

    generator.open(6);
    let repository_ref = &repository;
    assert!(
        TestEnv::wait_for(
            move || async move { repository_ref.summary_count() == 6 },
            Duration::from_secs(5),
        )
        .await
    );
    assert_eq!(generator.max_in_flight(), 2);

    shutdown_tx.send(()).unwrap();
    run.await.unwrap();
}

#[tokio::test]
async fn test_saturated_dispatcher_keeps_backlog() {
    const MESSAGES: i64 = 1500;
    let repository = MockSummaryRepository::new();
    for user_id in 1..=MESSAGES {
        repository.add_diary(user_id, date(2024, 1, 15), "entry");
    }
    let channel = Arc::new(InMemoryChannel::new());
    let generator = Arc::new(GatedGenerator::new());
    let dispatcher = dispatcher(
        Arc::new(InMemoryLock::new()),
        channel.clone(),
        generator.clone(),
        &repository,
        settings(1),
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let run = tokio::spawn(Arc::clone(&dispatcher).run(shutdown_rx));
    let channel_ref = &channel;
    assert!(
        TestEnv::wait_for(
            move || async move { channel_ref.subscriber_count(CHANNEL) == 1 },
            Duration::from_secs(5),
        )
        .await
    );

    // 单个槽位被阻塞时发布的消息全部排队
    for user_id in 1..=MESSAGES {
        let payload = WorkMessageBuilder::new()
            .with_user(user_id)
            .daily(2024, 1, 15)
            .payload();
        channel
            .publish(CHANNEL, std::str::from_utf8(&payload).unwrap())
            .await
            .unwrap();
    }

    generator.open(MESSAGES as usize);
    let repository_ref = &repository;
    assert!(
        TestEnv::wait_for(
            move || async move { repository_ref.summary_count() == MESSAGES as usize },
            Duration::from_secs(30),
        )
        .await
    );
    assert_eq!(generator.calls(), MESSAGES as usize);
    assert_eq!(generator.max_in_flight(), 1);

    shutdown_tx.send(()).unwrap();
    run.await.unwrap();
}

#[tokio::test]
async fn test_in_flight_count_recovers_after_handler_panic() {
    let repository = repository_with_diary(1);
    let channel = Arc::new(InMemoryChannel::new());
    let lock = Arc::new(InMemoryLock::new());
    let metrics = Arc::new(MetricsCollector::new());
    let dispatcher = Arc::new(SummaryDispatcher::new(
        lock.clone(),
        channel.clone(),
        Arc::new(CrashingGenerator),
        Arc::new(repository.clone()),
        settings(1),
        Arc::clone(&metrics),
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let run = tokio::spawn(Arc::clone(&dispatcher).run(shutdown_rx));
    let channel_ref = &channel;
    assert!(
        TestEnv::wait_for(
            move || async move { channel_ref.subscriber_count(CHANNEL) == 1 },
            Duration::from_secs(5),
        )
        .await
    );

    let message = WorkMessageBuilder::new().with_user(1).daily(2024, 1, 15);
    channel
        .publish(CHANNEL, std::str::from_utf8(&message.payload()).unwrap())
        .await
        .unwrap();

    // 处理开始后锁被占用；panic后锁只能等TTL过期
    let key = message.unit().lock_key();
    let lock_ref = &lock;
    let key_ref = &key;
    assert!(
        TestEnv::wait_for(
            move || async move { lock_ref.is_held(key_ref).await.unwrap() },
            Duration::from_secs(5),
        )
        .await
    );
    let metrics_ref = &metrics;
    assert!(
        TestEnv::wait_for(
            move || async move { metrics_ref.jobs_in_flight() == 0 },
            Duration::from_secs(5),
        )
        .await
    );
    assert_eq!(repository.summary_count(), 0);

    shutdown_tx.send(()).unwrap();
    run.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_jobs() {
    let repository = repository_with_diary(1);
    let channel = Arc::new(InMemoryChannel::new());
    let generator = Arc::new(GatedGenerator::new());
    let lock = Arc::new(InMemoryLock::new());
    let dispatcher = dispatcher(
        lock.clone(),
        channel.clone(),
        generator.clone(),
        &repository,
        settings(2),
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let run = tokio::spawn(Arc::clone(&dispatcher).run(shutdown_rx));
    let channel_ref = &channel;
    assert!(
        TestEnv::wait_for(
            move || async move { channel_ref.subscriber_count(CHANNEL) == 1 },
            Duration::from_secs(5),
        )
        .await
    );

    let message = WorkMessageBuilder::new().with_user(1).daily(2024, 1, 15);
    channel
        .publish(CHANNEL, &message.build().encode().unwrap())
        .await
        .unwrap();
    let generator_ref = &generator;
    assert!(
        TestEnv::wait_for(move || async move { generator_ref.calls() == 1 }, Duration::from_secs(5))
            .await
    );

    shutdown_tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!run.is_finished());

    generator.open(1);
    run.await.unwrap();
    assert!(repository.summary_for(&message.unit()).is_some());
    assert!(!lock.is_held(&message.unit().lock_key()).await.unwrap());
}

#[tokio::test]
async fn test_resubscribes_after_disconnect() {
    let repository = repository_with_diary(1);
    let channel = Arc::new(InMemoryChannel::new());
    let mut generator = MockSummaryGenerator::new();
    generator
        .expect_generate()
        .times(1)
        .returning(|_| Ok("summary".to_string()));
    let dispatcher = dispatcher(
        Arc::new(InMemoryLock::new()),
        channel.clone(),
        Arc::new(generator),
        &repository,
        settings(1),
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let run = tokio::spawn(Arc::clone(&dispatcher).run(shutdown_rx));
    let channel_ref = &channel;
    assert!(
        TestEnv::wait_for(
            move || async move { channel_ref.subscriber_count(CHANNEL) == 1 },
            Duration::from_secs(5),
        )
        .await
    );

    channel.disconnect_subscribers(CHANNEL).unwrap();
    assert_eq!(channel.subscriber_count(CHANNEL), 0);
    assert!(
        TestEnv::wait_for(
            move || async move { channel_ref.subscriber_count(CHANNEL) == 1 },
            Duration::from_secs(5),
        )
        .await
    );

    let message = WorkMessageBuilder::new().with_user(1).daily(2024, 1, 15);
    channel
        .publish(CHANNEL, &message.build().encode().unwrap())
        .await
        .unwrap();
    let repository_ref = &repository;
    let unit = message.unit();
    assert!(
        TestEnv::wait_for(
            move || async move { repository_ref.summary_for(&unit).is_some() },
            Duration::from_secs(5),
        )
        .await
    );

    shutdown_tx.send(()).unwrap();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_keeps_lock_during_long_generation() {
    let repository = repository_with_diary(1);
    let lock = Arc::new(InMemoryLock::new());
    let generator = Arc::new(GatedGenerator::new());
    let settings = DispatcherSettings::new(CHANNEL, 1)
        .unwrap()
        .with_lock_ttl(Duration::from_secs(10))
        .unwrap()
        .with_lock_heartbeat(Some(Duration::from_secs(3)))
        .unwrap();
    let dispatcher = dispatcher(
        lock.clone(),
        Arc::new(InMemoryChannel::new()),
        generator.clone(),
        &repository,
        settings,
    );
    let unit = WorkUnit::new(1, SummaryPeriod::daily(date(2024, 1, 15)));

    let job = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.handle_unit(unit).await }
    });
    let generator_ref = &generator;
    assert!(
        TestEnv::wait_for(move || async move { generator_ref.calls() == 1 }, Duration::from_secs(1))
            .await
    );

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert!(lock.is_held(&unit.lock_key()).await.unwrap());

    generator.open(1);
    assert_eq!(job.await.unwrap().unwrap(), ProcessOutcome::Completed);
    assert!(!lock.is_held(&unit.lock_key()).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_lock_expires_without_heartbeat() {
    let repository = repository_with_diary(1);
    let lock = Arc::new(InMemoryLock::new());
    let generator = Arc::new(GatedGenerator::new());
    let settings = DispatcherSettings::new(CHANNEL, 1)
        .unwrap()
        .with_lock_ttl(Duration::from_secs(10))
        .unwrap();
    let dispatcher = dispatcher(
        lock.clone(),
        Arc::new(InMemoryChannel::new()),
        generator.clone(),
        &repository,
        settings,
    );
    let unit = WorkUnit::new(1, SummaryPeriod::daily(date(2024, 1, 15)));

    let job = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.handle_unit(unit).await }
    });
    let generator_ref = &generator;
    assert!(
        TestEnv::wait_for(move || async move { generator_ref.calls() == 1 }, Duration::from_secs(1))
            .await
    );

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert!(!lock.is_held(&unit.lock_key()).await.unwrap());

    // 租约过期后的结果仍然保存，释放是空操作
    generator.open(1);
    assert_eq!(job.await.unwrap().unwrap(), ProcessOutcome::Completed);
    assert!(repository.summary_for(&unit).is_some());
}
