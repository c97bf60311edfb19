use rangescope_session::*;

const SNAPSHOT: &str = r#"{"daily": {"klines": {"BTCUSDT": {"from": "2020-01-01", "to": "2020-12-31"}}}}"#;

#[tokio::test]
async fn events_apply_in_order_and_render_after_each_change() {
    let (handle, events) = channel(DEFAULT_QUEUE_CAPACITY);

    let mut frames = Vec::new();
    let runner = tokio::spawn(async move {
        let session = run_session(Session::new(), events, |view| frames.push(view.clone())).await;
        (session, frames)
    });

    handle.snapshot(SNAPSHOT).await.unwrap();
    handle.select(Slot::Frequency, "daily").await.unwrap();
    handle.select(Slot::Category, "klines").await.unwrap();
    handle.select(Slot::Instrument, "BTCUSDT").await.unwrap();
    handle.shutdown().await.unwrap();

    let (session, frames) = runner.await.unwrap();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0].frequencies, ["daily"]);
    assert_eq!(frames[0].result, None);
    assert_eq!(frames[3].result.as_ref().unwrap().to, "2020-12-31");
    assert_eq!(session.generation(), 1);
}

#[tokio::test]
async fn rejected_snapshot_does_not_render_or_stop_the_loop() {
    let (handle, events) = channel(4);

    let mut frames = 0usize;
    let runner = tokio::spawn(async move {
        let session = run_session(Session::new(), events, |_| frames += 1).await;
        (session, frames)
    });

    handle.snapshot("not a catalog").await.unwrap();
    handle.snapshot(SNAPSHOT).await.unwrap();
    handle.send(SessionEvent::Refresh).await.unwrap();
    drop(handle);

    let (session, frames) = runner.await.unwrap();
    assert_eq!(frames, 2);
    assert_eq!(session.generation(), 1);
}

#[tokio::test]
async fn ignored_pick_does_not_render() {
    let (handle, events) = channel(4);
    let mut frames = 0usize;
    let runner = tokio::spawn(async move {
        run_session(Session::new(), events, |_| frames += 1).await;
        frames
    });

    // No catalog yet, and no parent for the category.
    handle.select(Slot::Frequency, "daily").await.unwrap();
    handle.select(Slot::Category, "klines").await.unwrap();
    drop(handle);

    assert_eq!(runner.await.unwrap(), 0);
}

#[tokio::test]
async fn handle_reports_closed_after_shutdown() {
    let (handle, events) = channel(1);
    let runner = tokio::spawn(run_session(Session::new(), events, |_| {}));

    handle.shutdown().await.unwrap();
    runner.await.unwrap();

    assert!(handle.is_closed());
    assert_eq!(handle.snapshot(SNAPSHOT).await, Err(SessionClosed));
}

#[test]
fn apply_reports_what_happened() {
    let mut session = Session::new();
    assert_eq!(session.apply(SessionEvent::Snapshot("[]".into())), Applied::Unchanged);
    assert_eq!(session.apply(SessionEvent::Snapshot(SNAPSHOT.into())), Applied::Changed);
    assert_eq!(
        session.apply(SessionEvent::Select {
            slot: Slot::Frequency,
            key: "daily".into(),
        }),
        Applied::Changed
    );
    assert_eq!(session.apply(SessionEvent::ClearSelection), Applied::Changed);
    assert!(session.selection().is_empty());
    assert_eq!(session.apply(SessionEvent::Shutdown), Applied::Stop);
}

#[tokio::test]
async fn parsed_catalog_replaces_and_keeps_selection() {
    let (handle, events) = channel(8);

    let mut frames = Vec::new();
    let runner = tokio::spawn(async move {
        let session = run_session(Session::new(), events, |view| frames.push(view.clone())).await;
        (session, frames)
    });

    let first = rangescope_catalog::parse_catalog(SNAPSHOT).unwrap();
    let second = rangescope_catalog::parse_catalog(
        r#"{"daily": {"klines": {"ETHUSDT": {"from": "2021-01-01", "to": "2021-06-30"}}}}"#,
    )
    .unwrap();

    handle.send(SessionEvent::Catalog(first)).await.unwrap();
    handle.select(Slot::Frequency, "daily").await.unwrap();
    handle.select(Slot::Category, "klines").await.unwrap();
    handle.select(Slot::Instrument, "BTCUSDT").await.unwrap();
    handle.send(SessionEvent::Catalog(second)).await.unwrap();
    handle.shutdown().await.unwrap();

    let (session, frames) = runner.await.unwrap();
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[3].result.as_ref().unwrap().to, "2020-12-31");

    let last = &frames[4];
    assert_eq!(last.instruments, ["ETHUSDT"]);
    assert_eq!(last.selection.instrument(), Some("BTCUSDT"));
    assert_eq!(last.stale, Some(Slot::Instrument));
    assert_eq!(last.result, None);
    assert_eq!(session.generation(), 2);
}
