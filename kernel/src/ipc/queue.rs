//! Per-receiver send queues.
//!
//! Every TCB heads a circular doubly-linked queue of senders blocked
//! waiting for *it* to receive, threaded through the senders' own link
//! fields. Enqueue is at the tail, so arrival order is preserved; dequeue
//! is by the receiver's choice (head, or a specific sender).

use crate::objects::{TcbTable, Tid};

/// Park `src` at the tail of `dest`'s send queue.
pub(crate) fn enqueue_send(tcbs: &mut TcbTable, dest: Tid, src: Tid) {
    debug_assert!(tcbs.tcb(src).next.is_none() && tcbs.tcb(src).prev.is_none());

    match tcbs.tcb(dest).ipc_send_head {
        None => {
            tcbs.tcb_mut(dest).ipc_send_head = Some(src);
            let tcb = tcbs.tcb_mut(src);
            tcb.next = Some(src);
            tcb.prev = Some(src);
        }
        Some(first) => {
            let last = tcbs.tcb(first).prev.expect("send queue links broken");
            tcbs.tcb_mut(src).next = Some(first);
            tcbs.tcb_mut(src).prev = Some(last);
            tcbs.tcb_mut(first).prev = Some(src);
            tcbs.tcb_mut(last).next = Some(src);
        }
    }
}

/// Unlink `src` from `dest`'s send queue.
pub(crate) fn dequeue_send(tcbs: &mut TcbTable, dest: Tid, src: Tid) {
    debug_assert!(tcbs.tcb(src).next.is_some() && tcbs.tcb(src).prev.is_some());
    debug_assert!(tcbs.tcb(dest).ipc_send_head.is_some());

    if tcbs.tcb(src).next == Some(src) {
        // Last sender on the queue.
        tcbs.tcb_mut(dest).ipc_send_head = None;
    } else {
        let next = tcbs.tcb(src).next.expect("send queue links broken");
        let prev = tcbs.tcb(src).prev.expect("send queue links broken");
        tcbs.tcb_mut(next).prev = Some(prev);
        tcbs.tcb_mut(prev).next = Some(next);
        if tcbs.tcb(dest).ipc_send_head == Some(src) {
            tcbs.tcb_mut(dest).ipc_send_head = Some(next);
        }
    }
    let tcb = tcbs.tcb_mut(src);
    tcb.next = None;
    tcb.prev = None;
}

/// Whether `src` is parked on `dest`'s send queue.
pub(crate) fn on_send_queue(tcbs: &TcbTable, dest: Tid, src: Tid) -> bool {
    let Some(head) = tcbs.tcb(dest).ipc_send_head else {
        return false;
    };
    let mut cur = head;
    loop {
        if cur == src {
            return true;
        }
        cur = tcbs.tcb(cur).next.expect("send queue links broken");
        if cur == head {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use alloc::vec::Vec;

    fn queue_order(tcbs: &TcbTable, dest: Tid) -> Vec<Tid> {
        let mut out = Vec::new();
        let Some(head) = tcbs.tcb(dest).ipc_send_head else {
            return out;
        };
        let mut cur = head;
        loop {
            out.push(cur);
            cur = tcbs.tcb(cur).next.unwrap();
            if cur == head {
                break;
            }
        }
        out
    }

    fn table_with(n: usize) -> TcbTable {
        let mut tcbs = TcbTable::new(&Config::new(n));
        for _ in 0..n {
            tcbs.allocate().unwrap();
        }
        tcbs
    }

    #[test]
    fn enqueue_preserves_arrival_order() {
        let mut tcbs = table_with(5);
        let dest = Tid(0);
        for i in 1..5 {
            enqueue_send(&mut tcbs, dest, Tid(i));
        }
        assert_eq!(queue_order(&tcbs, dest), [Tid(1), Tid(2), Tid(3), Tid(4)]);
    }

    #[test]
    fn dequeue_head_middle_and_tail() {
        let mut tcbs = table_with(5);
        let dest = Tid(0);
        for i in 1..5 {
            enqueue_send(&mut tcbs, dest, Tid(i));
        }

        dequeue_send(&mut tcbs, dest, Tid(1)); // head
        assert_eq!(queue_order(&tcbs, dest), [Tid(2), Tid(3), Tid(4)]);

        dequeue_send(&mut tcbs, dest, Tid(3)); // middle
        assert_eq!(queue_order(&tcbs, dest), [Tid(2), Tid(4)]);

        dequeue_send(&mut tcbs, dest, Tid(4)); // tail
        assert_eq!(queue_order(&tcbs, dest), [Tid(2)]);

        dequeue_send(&mut tcbs, dest, Tid(2)); // last
        assert!(queue_order(&tcbs, dest).is_empty());
        assert_eq!(tcbs.tcb(dest).ipc_send_head, None);
    }

    #[test]
    fn membership_check_walks_the_ring() {
        let mut tcbs = table_with(4);
        let dest = Tid(0);
        enqueue_send(&mut tcbs, dest, Tid(1));
        enqueue_send(&mut tcbs, dest, Tid(2));

        assert!(on_send_queue(&tcbs, dest, Tid(1)));
        assert!(on_send_queue(&tcbs, dest, Tid(2)));
        assert!(!on_send_queue(&tcbs, dest, Tid(3)));
    }

    #[test]
    fn links_are_cleared_on_dequeue() {
        let mut tcbs = table_with(3);
        enqueue_send(&mut tcbs, Tid(0), Tid(1));
        dequeue_send(&mut tcbs, Tid(0), Tid(1));
        assert_eq!(tcbs.tcb(Tid(1)).next, None);
        assert_eq!(tcbs.tcb(Tid(1)).prev, None);
    }
}
