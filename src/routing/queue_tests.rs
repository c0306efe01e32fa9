use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use super::queue::ConcurrentQueue;
use super::stop_signal::StopSignal;

#[tokio::test]
async fn test_items_drain_in_insertion_order() {
	let queue = ConcurrentQueue::new();
	let producer = queue.producer();
	queue.add(1);
	producer.add(2);
	producer.clone().add(3);
	assert_eq!(queue.len(), 3);

	let mut drain = queue.drain(StopSignal::new());
	drop(producer);
	assert_eq!(drain.next().await, Some(1));
	assert_eq!(drain.next().await, Some(2));
	assert_eq!(drain.next().await, Some(3));
	// Every producer is gone.
	assert_eq!(drain.next().await, None);
	assert!(drain.is_closed());
}

#[tokio::test]
async fn test_drain_waits_for_items_added_later() {
	let queue = ConcurrentQueue::new();
	let producer = queue.producer();
	let mut drain = queue.drain(StopSignal::new());

	let feeder = tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(20)).await;
		producer.add("late");
	});

	let item = timeout(Duration::from_secs(1), drain.next()).await.unwrap();
	assert_eq!(item, Some("late"));
	feeder.await.unwrap();
}

#[tokio::test]
async fn test_stop_unblocks_waiting_drain() {
	let queue = ConcurrentQueue::<u32>::new();
	let _producer = queue.producer();
	let stop = StopSignal::new();
	let mut drain = queue.drain(stop.clone());

	let waiter = tokio::spawn(async move {
		let item = drain.next().await;
		(item, drain.is_closed())
	});
	tokio::task::yield_now().await;
	stop.trigger();

	let (item, closed) = timeout(Duration::from_secs(1), waiter)
		.await
		.expect("drain did not observe the stop signal")
		.unwrap();
	assert_eq!(item, None);
	assert!(closed);
}

#[tokio::test]
async fn test_stop_wins_over_queued_items() {
	let queue = ConcurrentQueue::new();
	queue.add("pending");
	let stop = StopSignal::new();
	stop.trigger();

	let mut drain = queue.drain(stop);
	assert_eq!(drain.next().await, None);
	assert_eq!(drain.next().await, None);
}

#[tokio::test]
async fn test_close_discards_items_and_rejects_producers() {
	let queue = ConcurrentQueue::new();
	let producer = queue.producer();
	producer.add(1);
	let mut drain = queue.drain(StopSignal::new());

	drain.close();
	assert!(producer.is_closed());
	producer.add(2);
	assert_eq!(drain.next().await, None);
}

#[tokio::test]
async fn test_into_stream_collects_until_producers_gone() {
	let queue = ConcurrentQueue::new();
	let producer = queue.producer();
	for i in 0..5 {
		producer.add(i);
	}
	drop(producer);

	let items: Vec<_> = queue.drain(StopSignal::new()).into_stream().collect().await;
	assert_eq!(items, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_stop_signal_is_shared_between_clones() {
	let stop = StopSignal::new();
	let clone = stop.clone();
	assert!(!clone.is_triggered());
	stop.trigger();
	stop.trigger();
	assert!(clone.is_triggered());
}
