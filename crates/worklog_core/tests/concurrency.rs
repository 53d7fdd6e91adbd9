use std::collections::HashSet;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use worklog_core::{AccountSpec, Entity, Store, UserSpec};

#[test]
fn parallel_creators_get_distinct_oids() {
    let store = Store::create_in_memory();
    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                let mut oids = Vec::new();
                for index in 0..25 {
                    let user = store
                        .create_user(UserSpec::new(format!("User {worker}-{index}")))
                        .unwrap();
                    let account = store
                        .create_account(&user, AccountSpec::new(format!("u{worker}_{index}")))
                        .unwrap();
                    oids.push(user.oid());
                    oids.push(account.oid());
                }
                oids
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for worker in workers {
        for oid in worker.join().unwrap() {
            assert!(seen.insert(oid), "oid {oid} handed out twice");
        }
    }
    assert_eq!(seen.len(), 400);
    assert_eq!(store.users().unwrap().len(), 200);
    assert_eq!(store.next_oid().get(), 401);
    store.validate().unwrap();
}

#[test]
fn store_lock_serializes_a_multi_step_sequence() {
    let store = Store::create_in_memory();
    let (started, wait_started) = mpsc::channel();

    let guard = store.lock();
    let contender = {
        let store = store.clone();
        thread::spawn(move || {
            started.send(()).unwrap();
            store.create_user(UserSpec::new("Late")).unwrap().oid()
        })
    };
    wait_started.recv().unwrap();
    thread::sleep(Duration::from_millis(20));

    let first = store.create_user(UserSpec::new("First")).unwrap();
    let second = store.create_user(UserSpec::new("Second")).unwrap();
    assert_eq!(second.oid().get(), first.oid().get() + 1);
    drop(guard);

    let late = contender.join().unwrap();
    assert!(late > second.oid());
}

#[test]
fn duplicate_logins_race_to_a_single_winner() {
    let store = Store::create_in_memory();
    let user = store.create_user(UserSpec::new("Ann")).unwrap();
    let racers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let user = user.clone();
            thread::spawn(move || store.create_account(&user, AccountSpec::new("ann")).is_ok())
        })
        .collect();

    let winners = racers
        .into_iter()
        .map(|racer| racer.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(user.accounts().unwrap().len(), 1);
}
