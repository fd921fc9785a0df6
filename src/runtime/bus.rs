use crate::common::events::{Event, EventType};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tokio::sync::{mpsc, RwLock};

/// 订阅全部事件类型的通配主题
pub const WILDCARD: &str = "*";

#[derive(Debug)]
struct Subscriber {
    topics: HashSet<String>,
    tx: mpsc::Sender<Event>,
}

impl Subscriber {
    fn wants(&self, event: &Event) -> bool {
        self.topics.contains(WILDCARD) || self.topics.contains(event.event_type.as_str())
    }
}

/// 一次成功的订阅：实际生效的主题与接收端
#[derive(Debug)]
pub struct Subscription {
    pub topics: Vec<String>,
    pub rx: mpsc::Receiver<Event>,
}

/// 实时事件总线：把新追加的事件推送给仪表盘的 WebSocket 订阅者
///
/// 每个订阅者持有一个有界队列；队列满或已关闭时直接跳过，发布方永不阻塞。
#[derive(Debug)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Subscriber>>,
    queue_capacity: usize,
}

impl EventBus {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// 注册订阅者；同一 id 重复注册时返回 `None`
    ///
    /// 未知的主题会被拒绝，全部被拒绝时退化为订阅全部类型。
    pub async fn subscribe(&self, client_id: &str, topics: &[String]) -> Option<Subscription> {
        let mut accepted: Vec<String> = Vec::new();
        for topic in topics {
            if topic != WILDCARD && EventType::from_str(topic).is_err() {
                tracing::warn!(
                    "[EventBus] Subscription denied: {} -> {}",
                    client_id,
                    topic
                );
            } else if !accepted.contains(topic) {
                accepted.push(topic.clone());
            }
        }
        if accepted.is_empty() {
            accepted.push(WILDCARD.to_string());
        }

        let mut subs = self.subscribers.write().await;
        if subs.contains_key(client_id) {
            return None;
        }
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        subs.insert(
            client_id.to_string(),
            Subscriber {
                topics: accepted.iter().cloned().collect(),
                tx,
            },
        );
        Some(Subscription {
            topics: accepted,
            rx,
        })
    }

    pub async fn unsubscribe(&self, client_id: &str) {
        self.subscribers.write().await.remove(client_id);
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// 发布事件，返回成功入队的订阅者数量
    pub async fn publish(&self, event: &Event) -> usize {
        let subs = self.subscribers.read().await;
        let mut delivered = 0usize;
        for (client_id, sub) in subs.iter().filter(|(_, s)| s.wants(event)) {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!("[EventBus] Queue full, dropping event for {}", client_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}
