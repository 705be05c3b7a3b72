use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder,
    register_histogram_vec, register_int_counter_vec,
};
use std::sync::OnceLock;
use std::time::Instant;

const METRIC_PREFIX: &str = "coursehub";

/// Metrics 注册结果，可能包含注册错误
type MetricRegistration<T> = Result<T, prometheus::Error>;

fn http_requests_total() -> &'static MetricRegistration<IntCounterVec> {
    static METRIC: OnceLock<MetricRegistration<IntCounterVec>> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter_vec!(
            Opts::new(
                format!("{METRIC_PREFIX}_http_requests_total"),
                "LMS HTTP 请求总数"
            ),
            &["method", "path", "status"]
        )
    })
}

fn http_request_duration_seconds() -> &'static MetricRegistration<HistogramVec> {
    static METRIC: OnceLock<MetricRegistration<HistogramVec>> = OnceLock::new();
    METRIC.get_or_init(|| {
        let opts = HistogramOpts::new(
            format!("{METRIC_PREFIX}_http_request_duration_seconds"),
            "LMS HTTP 请求耗时（秒）",
        );
        register_histogram_vec!(opts, &["method", "path"])
    })
}

fn xqueue_updates_total() -> &'static MetricRegistration<IntCounterVec> {
    static METRIC: OnceLock<MetricRegistration<IntCounterVec>> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter_vec!(
            Opts::new(
                format!("{METRIC_PREFIX}_xqueue_updates_total"),
                "XQueue 回调处理次数"
            ),
            &["action"]
        )
    })
}

fn xqueue_submissions_total() -> &'static MetricRegistration<IntCounterVec> {
    static METRIC: OnceLock<MetricRegistration<IntCounterVec>> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter_vec!(
            Opts::new(
                format!("{METRIC_PREFIX}_xqueue_submissions_total"),
                "提交到 XQueue 的证书任务数"
            ),
            &["action", "result"]
        )
    })
}

/// 回调成功处理后计数
pub fn inc_xqueue_update(action: &str) {
    if let Ok(counter) = xqueue_updates_total() {
        counter.with_label_values(&[action]).inc();
    }
}

/// 队列提交计数，`ok` 区分成功与失败
pub fn inc_xqueue_submission(action: &str, ok: bool) {
    if let Ok(counter) = xqueue_submissions_total() {
        let result = if ok { "ok" } else { "error" };
        counter.with_label_values(&[action, result]).inc();
    }
}

/// 课程页面共用一个通配路由，标签里补上末段动作以便区分
fn route_label(matched: Option<&str>, uri_path: &str) -> String {
    match matched {
        Some("/courses/{*path}") => match uri_path.trim_end_matches('/').rsplit_once('/') {
            Some((_, action @ ("progress" | "cohorts" | "generate_user_cert"))) => {
                format!("/courses/{{course_id}}/{action}")
            }
            _ => "/courses/{course_id}/<other>".to_string(),
        },
        Some(path) => path.to_string(),
        None => "<unmatched>".to_string(),
    }
}

pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().as_str().to_string();
    let matched = req.extensions().get::<MatchedPath>().map(|p| p.as_str().to_string());
    let route = route_label(matched.as_deref(), req.uri().path());

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    if let Ok(counter) = http_requests_total() {
        counter.with_label_values(&[&method, &route, &status]).inc();
    }
    if let Ok(histogram) = http_request_duration_seconds() {
        histogram.with_label_values(&[&method, &route]).observe(elapsed);
    }
    response
}

/// Prometheus 文本格式输出默认注册表
pub fn render_metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response();
    }
    let content_type = HeaderValue::from_str(encoder.format_type())
        .unwrap_or_else(|_| HeaderValue::from_static("text/plain; version=0.0.4"));
    ([(header::CONTENT_TYPE, content_type)], buffer).into_response()
}
