//! Bridge assembly.
//!
//! Owns the router and every correlation table, wires the built-in routes,
//! and exposes the outbound API. Build once per transport session.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use livebridge_core::error::{BridgeError, Result};
use livebridge_core::messages::{CustomMessage, RosMessage};
use livebridge_core::protocol::envelope::{PacketType, Payload};

use crate::config::BridgeConfig;
use crate::dispatch::{Dispatch, PacketHandler, Registration, TopicHandler, TopicRouter};
use crate::obs::BridgeMetrics;
use crate::pointcloud::{FrameSink, PointCloudHandler};
use crate::pubsub::{Publisher, Subscription, SubscriptionTable};
use crate::rpc::{self, ActionCoordinator, BehaviorTree, GoalCallbacks, ServiceCaller};
use crate::transport::{Reliability, Transport, TransportPacket};

pub struct Bridge {
    cfg: BridgeConfig,
    transport: Arc<dyn Transport>,
    router: TopicRouter,
    services: Arc<ServiceCaller>,
    actions: Arc<ActionCoordinator>,
    subscriptions: Arc<SubscriptionTable>,
    pointcloud: Arc<PointCloudHandler>,
    metrics: Arc<BridgeMetrics>,
    _routes: Vec<Registration>,
}

impl Bridge {
    /// Build a bridge over `transport`. Completed point-cloud frames go to `sink`.
    pub fn new(cfg: BridgeConfig, transport: Arc<dyn Transport>, sink: Arc<dyn FrameSink>) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(BridgeMetrics::default());
        let router = TopicRouter::new(Arc::clone(&metrics));

        let services = Arc::new(ServiceCaller::new(
            Arc::clone(&transport),
            cfg.bridge.call_timeout(),
            Arc::clone(&metrics),
        ));
        let actions = Arc::new(ActionCoordinator::new(
            Arc::clone(&transport),
            cfg.bridge.goal_idle_timeout(),
            Arc::clone(&metrics),
        ));
        let subscriptions = Arc::new(SubscriptionTable::new());
        let pointcloud = Arc::new(PointCloudHandler::new(&cfg.pointcloud, sink, Arc::clone(&metrics)));

        let mut routes = vec![router.register_packet(
            PacketType::ServiceResponse,
            Arc::clone(&services) as Arc<dyn PacketHandler>,
        )];
        for pt in [
            PacketType::ActionGoalResponse,
            PacketType::ActionFeedback,
            PacketType::ActionResult,
        ] {
            routes.push(router.register_packet(pt, Arc::clone(&actions) as Arc<dyn PacketHandler>));
        }
        routes.push(router.register_packet(
            PacketType::Message,
            Arc::clone(&subscriptions) as Arc<dyn PacketHandler>,
        ));
        for topic in pointcloud.topics() {
            routes.push(router.register_topic(topic, Arc::clone(&pointcloud) as Arc<dyn TopicHandler>));
        }

        info!(
            topics = ?router.registered_topics(),
            packets = router.registered_packets().len(),
            "bridge ready"
        );

        Ok(Self {
            cfg,
            transport,
            router,
            services,
            actions,
            subscriptions,
            pointcloud,
            metrics,
            _routes: routes,
        })
    }

    pub fn cfg(&self) -> &BridgeConfig {
        &self.cfg
    }

    pub fn metrics(&self) -> Arc<BridgeMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    pub fn services(&self) -> &ServiceCaller {
        &self.services
    }

    pub fn actions(&self) -> &ActionCoordinator {
        &self.actions
    }

    pub fn pointcloud(&self) -> &PointCloudHandler {
        &self.pointcloud
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Feed one inbound transport packet.
    pub fn on_transport_message(&self, packet: &TransportPacket) -> Dispatch {
        self.router.on_transport_message(packet)
    }

    /// Reliable publisher for a typed message.
    pub fn create_publisher<T: RosMessage + Default>(&self, topic: &str) -> Publisher<T> {
        self.create_publisher_with::<T>(topic, Reliability::Reliable)
    }

    pub fn create_publisher_with<T: RosMessage + Default>(
        &self,
        topic: &str,
        reliability: Reliability,
    ) -> Publisher<T> {
        let message_type = T::default().message_type().to_owned();
        Publisher::new(Arc::clone(&self.transport), topic, message_type, reliability)
    }

    /// Publisher for a message type with no typed binding.
    pub fn create_custom_publisher(&self, topic: &str, message_type: &str) -> Publisher<CustomMessage> {
        Publisher::new(
            Arc::clone(&self.transport),
            topic,
            message_type,
            Reliability::Reliable,
        )
    }

    pub fn subscribe(
        &self,
        topic_name: &str,
        callback: impl Fn(&Payload) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscriptions.subscribe(topic_name, callback)
    }

    pub fn call_service<F>(
        &self,
        service_name: &str,
        service_type: &str,
        request: Payload,
        on_response: F,
    ) -> Result<String>
    where
        F: FnOnce(Result<Payload>) + Send + 'static,
    {
        self.services.call(service_name, service_type, request, on_response)
    }

    pub fn send_goal(
        &self,
        action_name: &str,
        action_type: &str,
        goal: Payload,
        callbacks: GoalCallbacks,
    ) -> Result<String> {
        self.actions.send_goal(action_name, action_type, goal, callbacks)
    }

    pub fn cancel_goal(&self, action_name: &str, goal_id: &str) -> Result<()> {
        self.actions.cancel_goal(action_name, goal_id)
    }

    /// Run a behavior tree; `on_complete` reports success exactly once.
    pub fn execute_behavior<F>(&self, tree: BehaviorTree, on_complete: F) -> Result<String>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        rpc::execute_behavior(&self.actions, tree, Some(Box::new(on_complete)))
    }

    /// Run a behavior tree without waiting on its outcome.
    pub fn trigger_behavior(&self, tree: BehaviorTree) -> Result<String> {
        rpc::execute_behavior(&self.actions, tree, None)
    }

    /// Fail every call and goal past its deadline. Returns how many ended.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let n = self.services.sweep_expired(now) + self.actions.sweep_expired(now);
        if n > 0 {
            debug!(expired = n, "sweep");
        }
        n
    }

    /// Sweep on the configured interval until the bridge is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.cfg.bridge.sweep_interval();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let Some(bridge) = weak.upgrade() else {
                    debug!("bridge dropped; sweeper exiting");
                    break;
                };
                bridge.sweep_expired(Instant::now());
            }
        })
    }

    /// Fail everything still outstanding with `NotConnected`.
    pub fn shutdown(&self) {
        info!(
            pending_calls = self.services.pending_count(),
            active_goals = self.actions.active_goals(),
            "bridge shutting down"
        );
        self.services.fail_all(BridgeError::NotConnected);
        self.actions.fail_all(BridgeError::NotConnected);
    }
}
