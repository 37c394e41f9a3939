use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub requests_by_route: HashMap<String, RouteMetrics>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub total_response_time: Duration,
}

impl RouteMetrics {
    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            Duration::from_millis(0)
        } else {
            self.total_response_time / self.request_count as u32
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestMetrics {
    /// Stable label such as `user_overview`, never a path with a username.
    pub route: &'static str,
    pub response_time: Duration,
    pub success: bool,
    pub rate_limited: bool,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RwLock<ApiMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, request: RequestMetrics) {
        let mut metrics = self.metrics.write().await;
        metrics.total_requests += 1;
        if request.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
        }
        if request.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        let route = metrics
            .requests_by_route
            .entry(request.route.to_string())
            .or_default();
        route.request_count += 1;
        route.total_response_time += request.response_time;
        if !request.success {
            route.error_count += 1;
        }
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn reset_metrics(&self) {
        *self.metrics.write().await = ApiMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(route: &'static str, millis: u64, success: bool) -> RequestMetrics {
        RequestMetrics {
            route,
            response_time: Duration::from_millis(millis),
            success,
            rate_limited: false,
        }
    }

    #[tokio::test]
    async fn test_records_per_route() {
        let collector = MetricsCollector::new();
        collector.record_request(request("new_posts", 100, true)).await;
        collector.record_request(request("new_posts", 300, true)).await;
        collector.record_request(request("remove", 50, false)).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.failed_requests, 1);

        let new_posts = &metrics.requests_by_route["new_posts"];
        assert_eq!(new_posts.request_count, 2);
        assert_eq!(new_posts.average_response_time(), Duration::from_millis(200));
        assert_eq!(metrics.requests_by_route["remove"].error_count, 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let collector = MetricsCollector::new();
        collector.record_request(request("me", 10, true)).await;
        collector.reset_metrics().await;
        assert_eq!(collector.get_metrics().await.total_requests, 0);
    }
}
