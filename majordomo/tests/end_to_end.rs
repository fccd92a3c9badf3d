//! End-to-end scenarios: broker, client and worker tasks over the in-proc
//! transport.

use std::time::Duration;

use bytes::Bytes;
use majordomo::dev_tracing::init_tracing;
use majordomo::{Broker, Client, MajordomoError, Worker};

/// Give spawned tasks time to drain their queues.
async fn settle() {
    compio::time::sleep(Duration::from_millis(50)).await;
}

/// Spawn a worker that prefixes every request body with "REPLY".
fn spawn_echo_worker(endpoint: &'static str) {
    let mut worker = Worker::connect(endpoint, &b"echo"[..]).unwrap();
    compio::runtime::spawn(async move {
        while let Ok(request) = worker.recv().await {
            let mut body = vec![Bytes::from_static(b"REPLY")];
            body.extend(request.body.iter().cloned());
            if worker.reply(&request, body).is_err() {
                break;
            }
        }
    })
    .detach();
}

#[compio::test]
async fn basic_echo() {
    init_tracing();
    let broker = Broker::bind("inproc://e2e-echo-front", Some("inproc://e2e-echo-back")).unwrap();
    let handle = broker.handle();
    compio::runtime::spawn(broker.run()).detach();

    spawn_echo_worker("inproc://e2e-echo-back");
    settle().await;

    let mut client = Client::connect("inproc://e2e-echo-front", &b"echo"[..]).unwrap();
    let reply = client
        .request([Bytes::from_static(b"TEST")], Some(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(
        reply,
        vec![Bytes::from_static(b"REPLY"), Bytes::from_static(b"TEST")]
    );
    handle.shutdown();
}

#[compio::test]
async fn single_socket_serves_both_sides() {
    init_tracing();
    // no backend endpoint: clients and workers share the frontend
    let broker = Broker::bind("inproc://e2e-single", None).unwrap();
    let handle = broker.handle();
    compio::runtime::spawn(broker.run()).detach();

    spawn_echo_worker("inproc://e2e-single");
    settle().await;

    let mut client = Client::connect("inproc://e2e-single", &b"echo"[..]).unwrap();
    let reply = client
        .request([Bytes::from_static(b"MERGED")], Some(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(
        reply,
        vec![Bytes::from_static(b"REPLY"), Bytes::from_static(b"MERGED")]
    );
    handle.shutdown();
}

#[compio::test]
async fn empty_body_round_trips() {
    init_tracing();
    let broker = Broker::bind("inproc://e2e-empty-front", Some("inproc://e2e-empty-back")).unwrap();
    let handle = broker.handle();
    compio::runtime::spawn(broker.run()).detach();

    spawn_echo_worker("inproc://e2e-empty-back");
    settle().await;

    let mut client = Client::connect("inproc://e2e-empty-front", &b"echo"[..]).unwrap();
    let reply = client.request([], Some(Duration::from_secs(5))).await.unwrap();

    assert_eq!(reply, vec![Bytes::from_static(b"REPLY")]);
    handle.shutdown();
}

#[compio::test]
async fn queued_request_is_dispatched_on_registration() {
    init_tracing();
    let broker = Broker::bind("inproc://e2e-queue-front", Some("inproc://e2e-queue-back")).unwrap();
    let handle = broker.handle();
    compio::runtime::spawn(broker.run()).detach();

    // make "echo" known to the broker, then take its only worker away
    let early = Worker::connect("inproc://e2e-queue-back", &b"echo"[..]).unwrap();
    settle().await;
    early.shutdown();
    settle().await;

    // the request finds no worker and parks
    let request_task = compio::runtime::spawn(async {
        let mut client = Client::connect("inproc://e2e-queue-front", &b"echo"[..]).unwrap();
        client
            .request([Bytes::from_static(b"PARKED")], Some(Duration::from_secs(5)))
            .await
    });
    settle().await;

    // a fresh worker picks it up immediately
    spawn_echo_worker("inproc://e2e-queue-back");

    let reply = request_task.await.unwrap();
    assert_eq!(
        reply,
        vec![Bytes::from_static(b"REPLY"), Bytes::from_static(b"PARKED")]
    );
    handle.shutdown();
}

#[compio::test]
async fn unknown_service_times_out_client() {
    init_tracing();
    let broker =
        Broker::bind("inproc://e2e-nosuch-front", Some("inproc://e2e-nosuch-back")).unwrap();
    let handle = broker.handle();
    compio::runtime::spawn(broker.run()).detach();

    // a bystander on the backend to confirm nothing is emitted there
    let bystander = majordomo::inproc::PeerSocket::connect("inproc://e2e-nosuch-back").unwrap();

    let mut client = Client::connect("inproc://e2e-nosuch-front", &b"nosuch"[..]).unwrap();
    let err = client
        .request([Bytes::from_static(b"TEST")], Some(Duration::from_millis(100)))
        .await
        .unwrap_err();

    assert!(matches!(err, MajordomoError::RequestTimeout(_)));
    settle().await;
    assert!(bystander.try_recv().is_none());
    handle.shutdown();
}

#[compio::test]
async fn client_recovers_after_timeout() {
    init_tracing();
    let broker = Broker::bind("inproc://e2e-state-front", Some("inproc://e2e-state-back")).unwrap();
    let handle = broker.handle();
    compio::runtime::spawn(broker.run()).detach();

    // "echo" exists but has no workers, so requests park and time out
    let early = Worker::connect("inproc://e2e-state-back", &b"echo"[..]).unwrap();
    settle().await;
    early.shutdown();
    settle().await;

    let mut client = Client::connect("inproc://e2e-state-front", &b"echo"[..]).unwrap();
    let err = client
        .request([Bytes::from_static(b"one")], Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, MajordomoError::RequestTimeout(_)));

    // after a timeout the client is usable again
    let err = client
        .request([Bytes::from_static(b"two")], Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, MajordomoError::RequestTimeout(_)));
    handle.shutdown();
}

#[compio::test]
async fn sequential_busy_worker_serves_in_arrival_order() {
    init_tracing();
    let broker = Broker::bind("inproc://e2e-busy-front", Some("inproc://e2e-busy-back")).unwrap();
    let handle = broker.handle();
    compio::runtime::spawn(broker.run()).detach();

    // one deliberately slow worker
    let mut worker = Worker::connect("inproc://e2e-busy-back", &b"slow"[..]).unwrap();
    compio::runtime::spawn(async move {
        while let Ok(request) = worker.recv().await {
            compio::time::sleep(Duration::from_millis(30)).await;
            if worker.reply(&request, request.body.iter().cloned()).is_err() {
                break;
            }
        }
    })
    .detach();
    settle().await;

    let (done_tx, done_rx) = flume::unbounded::<&'static str>();
    for tag in ["one", "two", "three"] {
        let done_tx = done_tx.clone();
        compio::runtime::spawn(async move {
            let mut client = Client::connect("inproc://e2e-busy-front", &b"slow"[..]).unwrap();
            let reply = client
                .request(
                    [Bytes::copy_from_slice(tag.as_bytes())],
                    Some(Duration::from_secs(5)),
                )
                .await
                .unwrap();
            // each client gets its own payload back
            assert_eq!(reply, vec![Bytes::copy_from_slice(tag.as_bytes())]);
            done_tx.send(tag).unwrap();
        })
        .detach();
        // stagger the sends so broker arrival order is fixed
        compio::time::sleep(Duration::from_millis(10)).await;
    }

    // replies complete in arrival order
    assert_eq!(done_rx.recv_async().await.unwrap(), "one");
    assert_eq!(done_rx.recv_async().await.unwrap(), "two");
    assert_eq!(done_rx.recv_async().await.unwrap(), "three");
    handle.shutdown();
}

#[compio::test]
async fn worker_disconnect_command_evicts_it() {
    init_tracing();
    let broker = Broker::bind("inproc://e2e-disc-front", Some("inproc://e2e-disc-back")).unwrap();
    let handle = broker.handle();
    compio::runtime::spawn(broker.run()).detach();

    let worker = Worker::connect("inproc://e2e-disc-back", &b"echo"[..]).unwrap();
    settle().await;
    worker.shutdown();
    settle().await;

    // the service is still known but has no workers: the request parks and
    // the client times out
    let mut client = Client::connect("inproc://e2e-disc-front", &b"echo"[..]).unwrap();
    let err = client
        .request([Bytes::from_static(b"TEST")], Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, MajordomoError::RequestTimeout(_)));
    handle.shutdown();
}
