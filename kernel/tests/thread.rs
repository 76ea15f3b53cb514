//! Thread lifecycle tests: creation, identity, join/reap, yield.

mod common;

use common::*;
use nanok_kernel::abi::ErrorKind;
use nanok_kernel::ThreadState;

#[test]
fn create_identity_and_join() {
    let (mut k, root) = boot(8, 1);

    // Child out-ranks us, so it runs the moment it exists.
    let child = spawn(&mut k, 2);
    assert_eq!(k.current(), child);

    k.sys_thread_myself();
    expect_ok(&k, child, child.as_word());
    assert_ne!(child, root);

    k.sys_thread_exit();
    assert_eq!(k.current(), root);
    assert_eq!(k.thread_state(child), ThreadState::Zombie);

    k.sys_thread_join(child.as_word());
    expect_ok(&k, root, 0);
    assert_eq!(k.thread_state(child), ThreadState::Halted);
}

#[test]
fn join_reaps_and_the_slot_is_reused() {
    let (mut k, root) = boot(4, 1);

    // Lower-priority child: it only runs once we block on it.
    let b = spawn(&mut k, 0);
    k.sys_thread_join(b.as_word());
    assert_eq!(k.current(), b);

    k.sys_thread_exit();
    assert_eq!(k.current(), root);
    expect_ok(&k, root, 0);

    // The reaped slot is the free-list head again: same tid comes back.
    let again = spawn(&mut k, 0);
    assert_eq!(again, b);
}

#[test]
fn join_error_kinds() {
    let (mut k, root) = boot(8, 1);

    // Out-of-range tid.
    k.sys_thread_join(9999);
    expect_err(&k, root, ErrorKind::Invalid);

    // Joining yourself would never return.
    k.sys_thread_join(root.as_word());
    expect_err(&k, root, ErrorKind::Invalid);

    // Second joiner: equal-priority helper joins a sleeping target first.
    let helper = spawn(&mut k, 1);
    let target = spawn(&mut k, 0);
    k.sys_thread_join(target.as_word());
    assert_eq!(k.current(), helper);

    k.sys_thread_join(target.as_word());
    expect_err(&k, helper, ErrorKind::Busy);

    k.sys_thread_exit(); // helper
    assert_eq!(k.current(), target);
    k.sys_thread_exit(); // target wakes root, its joiner
    assert_eq!(k.current(), root);
    expect_ok(&k, root, 0);

    // The reaped target is halted now: joining it again is invalid.
    k.sys_thread_join(target.as_word());
    expect_err(&k, root, ErrorKind::Invalid);

    // The helper exited unjoined: still a zombie, reapable right away.
    k.sys_thread_join(helper.as_word());
    expect_ok(&k, root, 0);
}

#[test]
fn creating_past_the_table_reports_no_memory() {
    let (mut k, root) = boot(4, 1);

    for expected in 1..4 {
        let tid = spawn(&mut k, 0);
        assert_eq!(tid.as_word(), expected);
    }

    k.sys_thread_create(PC, SP, 0, 0);
    assert_eq!(k.retval(root), !0);
    expect_err(&k, root, ErrorKind::NoMemory);
}

#[test]
fn yield_rotates_equal_priorities_fifo() {
    let (mut k, root) = boot(8, 1);

    let a = spawn(&mut k, 1);
    let b = spawn(&mut k, 1);
    assert_eq!(k.current(), root);

    k.sys_yield();
    assert_eq!(k.current(), a);
    k.sys_yield();
    assert_eq!(k.current(), b);
    k.sys_yield();
    assert_eq!(k.current(), root);
    expect_ok(&k, root, 0);
}

#[test]
fn yield_alone_is_a_no_op() {
    let (mut k, root) = boot(4, 1);
    k.sys_yield();
    assert_eq!(k.current(), root);
    expect_ok(&k, root, 0);
}

#[test]
fn exit_wakes_a_waiting_joiner() {
    let (mut k, root) = boot(4, 1);

    let child = spawn(&mut k, 0);
    k.sys_thread_join(child.as_word());
    assert_eq!(k.thread_state(root), ThreadState::WaitJoin);
    assert_eq!(k.current(), child);

    k.sys_thread_exit();
    assert_eq!(k.current(), root);
    expect_ok(&k, root, 0);
    assert_eq!(k.thread_state(child), ThreadState::Halted);
}
