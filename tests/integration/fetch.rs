use std::sync::Arc;
use std::time::Duration;

use courier_client::{ClientFactory, MemoryStorage, SessionStore};
use courier_core::{CallContext, CallError, CourierConfig, ManualClock, Response};

use crate::*;

fn client_for(remote: &Arc<Remote>, clock: &ManualClock) -> courier_client::Client {
    ClientFactory::new(&CourierConfig::default(), Loopback::new(remote.clone()))
        .with_clock(Arc::new(clock.clone()))
        .no_auth(SessionStore::new(Arc::new(MemoryStorage::new()), "anon"))
        .unwrap()
}

#[tokio::test]
async fn one_and_a_half_mebibytes_in_three_reads() {
    let remote = Remote::new(MIB + MIB / 2);
    let client = client_for(&remote, &ManualClock::new());

    let data = client
        .fetcher()
        .fetch_all(&CallContext::new(), &document())
        .await
        .unwrap();

    assert_eq!(data.len(), 1_572_864);
    assert_eq!(&data, remote.file());
    assert_eq!(remote.offsets(), vec![0, 1_048_576, 2_097_152]);
}

#[tokio::test]
async fn empty_file_is_a_single_read() {
    let remote = Remote::new(0);
    let client = client_for(&remote, &ManualClock::new());

    let data = client
        .fetcher()
        .fetch_all(&CallContext::new(), &document())
        .await
        .unwrap();

    assert!(data.is_empty());
    assert_eq!(remote.offsets(), vec![0]);
}

#[tokio::test]
async fn transient_faults_mid_file_are_retried_in_place() {
    let remote = Remote::new(2 * MIB + 10);
    let clock = ManualClock::new();
    let client = client_for(&remote, &clock);

    let fetcher = client.fetcher();
    let ctx = CallContext::new();
    let head = fetcher.fetch_chunk(&ctx, &document(), 0).await.unwrap();
    assert_eq!(head.len(), MIB);

    remote.inject([
        Fault::Error(CallError::Transient("connection reset".into())),
        Fault::Error(CallError::from_rpc(420, "FLOOD_WAIT_2")),
    ]);
    let data = fetcher.fetch_all(&ctx, &document()).await.unwrap();

    assert_eq!(data.len(), 2 * MIB + 10);
    // Head read, then offset 0 three times before moving on.
    assert_eq!(
        remote.offsets(),
        vec![0, 0, 0, 0, 1_048_576, 2_097_152, 3_145_728]
    );
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_millis(500), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn fatal_error_keeps_what_was_read() {
    let remote = Remote::new(3 * MIB);
    let client = client_for(&remote, &ManualClock::new());
    let fetcher = client.fetcher();
    let ctx = CallContext::new();

    // Two full chunks succeed, then the reference expires.
    remote.inject([
        Fault::Reply(Response::File(remote.file().slice(0..MIB))),
        Fault::Reply(Response::File(remote.file().slice(MIB..2 * MIB))),
        Fault::Error(CallError::from_rpc(400, "FILE_REFERENCE_EXPIRED")),
    ]);

    let err = fetcher.fetch_all(&ctx, &document()).await.unwrap_err();

    assert_eq!(err.partial.len(), 2_097_152);
    assert_eq!(
        err.source,
        CallError::Rpc {
            code: 400,
            message: "FILE_REFERENCE_EXPIRED".into()
        }
    );
    assert_eq!(remote.offsets(), vec![0, 1_048_576, 2_097_152]);
}

#[tokio::test]
async fn cdn_redirect_is_rejected_by_type() {
    let remote = Remote::new(MIB);
    remote.inject([Fault::Reply(Response::CdnRedirect { dc_id: 203 })]);
    let client = client_for(&remote, &ManualClock::new());

    let err = client
        .fetcher()
        .fetch_all(&CallContext::new(), &document())
        .await
        .unwrap_err();

    assert!(err.partial.is_empty());
    assert_eq!(
        err.source,
        CallError::UnexpectedResponseType("upload.fileCdnRedirect")
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetchers_share_one_limiter() {
    let remote = Remote::new(3 * MIB);
    let client = ClientFactory::new(&CourierConfig::default(), Loopback::new(remote.clone()))
        .no_auth(SessionStore::new(Arc::new(MemoryStorage::new()), "anon"))
        .unwrap();

    let started = tokio::time::Instant::now();
    let a = tokio::spawn({
        let client = client.clone();
        async move { client.fetcher().fetch_all(&CallContext::new(), &document()).await }
    });
    let b = tokio::spawn({
        let client = client.clone();
        async move { client.fetcher().fetch_all(&CallContext::new(), &document()).await }
    });

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(a.len(), 3 * MIB);
    assert_eq!(b, a);
    // Four reads each, eight in total: burst of five then three refills.
    assert_eq!(remote.calls(), 8);
    assert!(started.elapsed() >= Duration::from_millis(300));
}
