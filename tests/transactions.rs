//! Transaction engine behavior across two endpoints: nested callbacks, LIFO
//! unwinding, and routing of concurrent calls to the right thread.

mod helpers;

use arabridge::ipc::IpcError;
use arabridge::prelude::*;
use arabridge::remote::method_id::{archiving_controller, document_controller, editor_view};
use arabridge::remote::RemoteError;
use crossbeam_channel::bounded;
use helpers::{handler, Session};
use parking_lot::Mutex;
use std::thread;
use std::time::{Duration, Instant};

const ARCHIVE_SIZE: usize = 1024;

/// Plug-in answers an event count query by asking the host for an archive size
/// first, so the callback reaches the host before the reply does.
fn event_count_via_callback(host_main_mode: DeliveryMode) {
    let session = Session::start_with(host_main_mode, |plugin| {
        let caller = RemoteCaller::new(plugin);
        handler(move |id, decoder, reply| {
            assert_eq!(id, document_controller::GET_CONTENT_READER_EVENT_COUNT);
            let reader: RemoteRef = decode_required(0, decoder).unwrap();
            assert_eq!(reader, RemoteRef::from_raw(9));
            let size: usize = caller
                .call(archiving_controller::GET_ARCHIVE_SIZE, (RemoteRef::from_raw(3),))
                .unwrap();
            (size / 256).encode(keys::RETURN_VALUE, reply);
        })
    });

    let host_thread = thread::current().id();
    let callbacks = Arc::new(Mutex::new(Vec::new()));
    let host_handler = {
        let callbacks = Arc::clone(&callbacks);
        handler(move |id, decoder, reply| {
            assert_eq!(id, archiving_controller::GET_ARCHIVE_SIZE);
            callbacks
                .lock()
                .push((thread::current().id(), decoder.read_size(0)));
            ARCHIVE_SIZE.encode(keys::RETURN_VALUE, reply);
        })
    };
    session.host.set_message_handler(&host_handler);

    let count: usize = session
        .caller()
        .call(
            document_controller::GET_CONTENT_READER_EVENT_COUNT,
            (RemoteRef::from_raw(9),),
        )
        .unwrap();

    assert_eq!(count, 4);
    assert_eq!(*callbacks.lock(), vec![(host_thread, Some(3))]);
}

#[test]
fn test_nested_callback_polled_main_channel() {
    event_count_via_callback(DeliveryMode::Polled);
}

#[test]
fn test_nested_callback_threaded_main_channel() {
    event_count_via_callback(DeliveryMode::threaded());
}

#[test]
fn test_nested_calls_unwind_lifo() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));

    let session = {
        let log = Arc::clone(&log);
        Session::start(move |plugin| {
            let caller = RemoteCaller::new(plugin);
            handler(move |id, decoder, reply| {
                let depth = decoder.read_int32(0).unwrap_or(0);
                log.lock().push(format!("plugin enter {}", depth));
                if id == document_controller::BEGIN_EDITING && depth < 3 {
                    let inner: i32 = caller
                        .call(archiving_controller::GET_ARCHIVE_SIZE, (depth + 1,))
                        .unwrap();
                    (inner + 1).encode(keys::RETURN_VALUE, reply);
                } else {
                    depth.encode(keys::RETURN_VALUE, reply);
                }
                log.lock().push(format!("plugin leave {}", depth));
            })
        })
    };

    let host_handler = {
        let log = Arc::clone(&log);
        let caller = session.caller();
        handler(move |_, decoder, reply| {
            let depth = decoder.read_int32(0).unwrap_or(0);
            log.lock().push(format!("host enter {}", depth));
            let inner: i32 = caller
                .call(document_controller::BEGIN_EDITING, (depth + 1,))
                .unwrap();
            (inner + 1).encode(keys::RETURN_VALUE, reply);
            log.lock().push(format!("host leave {}", depth));
        })
    };
    session.host.set_message_handler(&host_handler);

    let result: i32 = session
        .caller()
        .call(document_controller::BEGIN_EDITING, (0,))
        .unwrap();

    // depth 0 (plugin) -> 1 (host) -> 2 (plugin) -> 3 (host) -> 4 (plugin, leaf)
    assert_eq!(result, 4 + 4);
    assert_eq!(
        *log.lock(),
        vec![
            "plugin enter 0",
            "host enter 1",
            "plugin enter 2",
            "host enter 3",
            "plugin enter 4",
            "plugin leave 4",
            "host leave 3",
            "plugin leave 2",
            "host leave 1",
            "plugin leave 0",
        ]
    );
}

#[test]
fn test_concurrent_main_and_other_thread_calls() {
    let session = Session::start(|_plugin| {
        handler(|id, decoder, reply| {
            let value = decoder.read_int32(0).unwrap();
            if id == document_controller::STORE_OBJECTS_TO_ARCHIVE {
                thread::sleep(Duration::from_millis(30));
                (-value).encode(keys::RETURN_VALUE, reply);
            } else {
                (value * 2).encode(keys::RETURN_VALUE, reply);
            }
        })
    });

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let caller = session.caller();
            thread::spawn(move || {
                (0..10)
                    .map(|i| {
                        let value = worker * 100 + i;
                        let doubled: i32 = caller
                            .call(document_controller::GET_CONTENT_READER_EVENT_COUNT, (value,))
                            .unwrap();
                        assert_eq!(doubled, value * 2);
                        doubled
                    })
                    .count()
            })
        })
        .collect();

    for value in 1..=5 {
        let negated: i32 = session
            .caller()
            .call(document_controller::STORE_OBJECTS_TO_ARCHIVE, (value,))
            .unwrap();
        assert_eq!(negated, -value);
    }

    let completed: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(completed, 40);
}

#[test]
fn test_other_thread_callback_returns_to_calling_thread() {
    let session = Session::start(|plugin| {
        let caller = RemoteCaller::new(plugin);
        handler(move |_, _, reply| {
            // Runs off the plug-in's main thread; the callback must find the host
            // thread that made the call.
            let host_thread: String = caller
                .call(editor_view::NOTIFY_SELECTION, ())
                .unwrap();
            host_thread.encode(keys::RETURN_VALUE, reply);
        })
    });

    let host_handler = handler(|_, _, reply| {
        format!("{:?}", thread::current().id()).encode(keys::RETURN_VALUE, reply);
    });
    session.host.set_message_handler(&host_handler);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let caller = session.caller();
            thread::spawn(move || {
                let me = format!("{:?}", thread::current().id());
                for _ in 0..5 {
                    let handled_on: String = caller
                        .call(document_controller::NOTIFY_MODEL_UPDATES, ())
                        .unwrap();
                    assert_eq!(handled_on, me);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn test_creation_thread_task_runs_while_waiting() {
    let session = Session::start(|_plugin| {
        handler(|_, _, reply| {
            thread::sleep(Duration::from_millis(20));
            true.encode(keys::RETURN_VALUE, reply);
        })
    });

    let host_thread = thread::current().id();
    let ran_on = Arc::new(Mutex::new(None));
    let worker = {
        let host = Arc::clone(&session.host);
        let ran_on = Arc::clone(&ran_on);
        thread::spawn(move || {
            host.dispatch_to_creation_thread(move || {
                *ran_on.lock() = Some(thread::current().id());
            });
        })
    };
    worker.join().unwrap();

    let ok: bool = session
        .caller()
        .call(document_controller::END_EDITING, ())
        .unwrap();
    assert!(ok);
    assert_eq!(*ran_on.lock(), Some(host_thread));
}

#[test]
fn test_closed_peer_fails_calls() {
    let mut session = Session::start(|_plugin| handler(|_, _, _| {}));
    session.stop_plugin();

    let result = session
        .caller()
        .call_void(document_controller::END_EDITING, ());
    assert!(matches!(
        result,
        Err(RemoteError::Ipc(IpcError::ChannelClosed))
    ));
}

#[test]
fn test_wait_delegate_runs_while_blocked() {
    let session = Session::start(|_plugin| {
        handler(|_, _, reply| {
            thread::sleep(Duration::from_millis(30));
            7i32.encode(keys::RETURN_VALUE, reply);
        })
    });

    let idle_rounds = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    {
        let idle_rounds = Arc::clone(&idle_rounds);
        session.host.set_wait_for_message_delegate(move || {
            idle_rounds.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
    }

    let value: i32 = session
        .caller()
        .call(document_controller::GET_CONTENT_READER_EVENT_COUNT, ())
        .unwrap();
    assert_eq!(value, 7);
    assert!(idle_rounds.load(std::sync::atomic::Ordering::SeqCst) > 0);
}

#[test]
fn test_crossing_call_runs_on_blocked_creation_thread() {
    let session = Session::start_with(DeliveryMode::threaded(), |_plugin| {
        handler(|_, _, reply| {
            true.encode(keys::RETURN_VALUE, reply);
        })
    });

    let host_thread = thread::current().id();
    let ran_on = Arc::new(Mutex::new(None));
    let host_handler = {
        let ran_on = Arc::clone(&ran_on);
        handler(move |id, _, reply| {
            assert_eq!(id, editor_view::NOTIFY_SELECTION);
            *ran_on.lock() = Some(thread::current().id());
            5i32.encode(keys::RETURN_VALUE, reply);
        })
    };
    session.host.set_message_handler(&host_handler);

    // A plug-in main-thread call that starts its own transaction, crossing the
    // host's END_EDITING.
    let (answer_tx, answer_rx) = bounded(1);
    let plugin = Arc::clone(session.plugin.as_ref().unwrap());
    let plugin_caller = RemoteCaller::new(Arc::clone(&plugin));
    plugin.dispatch_to_creation_thread(move || {
        let answer: i32 = plugin_caller
            .call(editor_view::NOTIFY_SELECTION, ())
            .unwrap();
        answer_tx.send(answer).unwrap();
    });

    let ok: bool = session
        .caller()
        .call(document_controller::END_EDITING, ())
        .unwrap();
    assert!(ok);

    // The crossing call may also arrive once END_EDITING has returned.
    let deadline = Instant::now() + Duration::from_secs(5);
    while ran_on.lock().is_none() {
        assert!(Instant::now() < deadline, "crossing call never handled");
        session
            .host
            .wait_for_message_on_creation_thread(Duration::from_millis(5));
    }
    assert_eq!(*ran_on.lock(), Some(host_thread));
    assert_eq!(answer_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 5);
}

#[test]
fn test_new_call_while_delivery_thread_awaits_callback() {
    let session = Session::start(|plugin| {
        let caller = RemoteCaller::new(plugin);
        handler(move |_, decoder, reply| {
            let value = decoder.read_int32(0).unwrap();
            if value == 1 {
                let size: i32 = caller
                    .call(archiving_controller::GET_ARCHIVE_SIZE, ())
                    .unwrap();
                (size + 1).encode(keys::RETURN_VALUE, reply);
            } else {
                (value * 10).encode(keys::RETURN_VALUE, reply);
            }
        })
    });

    let (in_callback_tx, in_callback_rx) = bounded(1);
    let (second_done_tx, second_done_rx) = bounded::<()>(1);
    let host_handler = handler(move |_, _, reply| {
        in_callback_tx.send(()).unwrap();
        // Keep the plug-in's delivery thread waiting until the second call is answered.
        let answered = second_done_rx.recv_timeout(Duration::from_secs(5)).is_ok();
        (if answered { 7 } else { -100 }).encode(keys::RETURN_VALUE, reply);
    });
    session.host.set_message_handler(&host_handler);

    let first = {
        let caller = session.caller();
        thread::spawn(move || -> i32 {
            caller
                .call(document_controller::GET_CONTENT_READER_EVENT_COUNT, (1,))
                .unwrap()
        })
    };
    in_callback_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let second = {
        let caller = session.caller();
        thread::spawn(move || -> i32 {
            let result = caller
                .call(document_controller::GET_CONTENT_READER_EVENT_COUNT, (3,))
                .unwrap();
            second_done_tx.send(()).unwrap();
            result
        })
    };

    assert_eq!(second.join().unwrap(), 30);
    assert_eq!(first.join().unwrap(), 8);
}

#[test]
fn test_more_callers_than_routed_slots() {
    let session = Session::start(|plugin| {
        let caller = RemoteCaller::new(plugin);
        handler(move |_, decoder, reply| {
            let value = decoder.read_int32(0).unwrap();
            let echoed: i32 = caller
                .call(editor_view::NOTIFY_HIDE_REGION_SEQUENCES, (value,))
                .unwrap();
            echoed.encode(keys::RETURN_VALUE, reply);
        })
    });
    let host_handler = handler(|_, decoder, reply| {
        (decoder.read_int32(0).unwrap() + 1).encode(keys::RETURN_VALUE, reply);
    });
    session.host.set_message_handler(&host_handler);

    let slots = session.host.config().routed_message_slots;
    assert_eq!(session.host.routed_message_capacity(), Some(slots));

    let workers: Vec<_> = (0..(slots * 2) as i32)
        .map(|value| {
            let caller = session.caller();
            thread::spawn(move || {
                let result: i32 = caller
                    .call(document_controller::NOTIFY_MODEL_UPDATES, (value,))
                    .unwrap();
                assert_eq!(result, value + 1);
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(session.host.routed_message_capacity().unwrap() >= slots);
}
