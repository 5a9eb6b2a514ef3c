//! The two-step check-in: pre-sign, walk the trace, then do-sign.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::canon::{canonical_json_string, Layout};
use crate::config::Config;
use crate::confirm::Confirm;
use crate::error::{Error, Result};
use crate::sign::{gen_nonce, SignedRequest};
use crate::trace::{Pacer, Trace, TraceGenerator, TraceOutcome};
use crate::transport::{Endpoint, DO_SIGN_TIMEOUT, PRE_SIGN_TIMEOUT};
use crate::types::{ApiResponse, CheckInRecord, DoSignData, PreSignData};

const PRE_SIGN_ACTION: &str = "pre_sign";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PreSign,
    DoSign,
}

/// How a run ended, short of an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Declined(Step),
    Interrupted,
}

/// Token handed out by a successful pre-sign; the do-sign must echo both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreSignGrant {
    pub pre_sign_id: String,
    pub nonce: String,
}

/// Sends the pre-sign request. `Ok(None)` if the gate declined.
pub async fn pre_sign<E, C>(
    endpoint: &E,
    confirm: &mut C,
    config: &Config,
) -> Result<Option<PreSignGrant>>
where
    E: Endpoint,
    C: Confirm + ?Sized,
{
    let nonce = gen_nonce();
    debug!(%nonce, "generated nonce");

    let request = SignedRequest::new(
        &PreSignData {
            ass_id: config.ass_id.clone(),
            nonce: nonce.clone(),
            sign_action: PRE_SIGN_ACTION.to_string(),
        },
        &config.salt,
    )?;

    if !confirm.confirm(endpoint.url(), &request.form_body()) {
        return Ok(None);
    }

    info!("sending pre-sign request");
    let response = endpoint.send(&request, PRE_SIGN_TIMEOUT).await?;
    info!(code = response.code, msg = response.message(), "pre-sign response");
    let response = ensure_success(response)?;

    let pre_sign_id = response
        .data
        .as_ref()
        .and_then(|d| d.get("pre_sign_id"))
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| Error::Protocol("pre-sign response lacks data.pre_sign_id".into()))?;

    info!(%pre_sign_id, "obtained pre-sign id");
    Ok(Some(PreSignGrant { pre_sign_id, nonce }))
}

/// Sends the final record. `Ok(false)` if the gate declined.
pub async fn do_sign<E, C>(
    endpoint: &E,
    confirm: &mut C,
    config: &Config,
    grant: &PreSignGrant,
    record: &CheckInRecord,
) -> Result<bool>
where
    E: Endpoint,
    C: Confirm + ?Sized,
{
    let extra = canonical_json_string(&serde_json::to_value(record)?, Layout::Compact)?;
    let request = SignedRequest::new(
        &DoSignData {
            ass_id: config.ass_id.clone(),
            extra,
            nonce: grant.nonce.clone(),
            pre_sign_id: grant.pre_sign_id.clone(),
        },
        &config.salt,
    )?;
    info!(sign = %request.sign, "final check-in request prepared");

    if !confirm.confirm(endpoint.url(), &request.form_body()) {
        return Ok(false);
    }

    let response = endpoint.send(&request, DO_SIGN_TIMEOUT).await?;
    info!(code = response.code, msg = response.message(), "check-in response");
    ensure_success(response)?;
    Ok(true)
}

pub fn build_record(config: &Config, trace: Trace) -> CheckInRecord {
    let end = trace.ended_at_ms.max(trace.started_at_ms);
    let elapsed_secs = (end - trace.started_at_ms) / 1000;
    CheckInRecord {
        ass_id: config.ass_id.clone(),
        duration: elapsed_secs,
        end_time: end.to_string(),
        history_time: end,
        pause_cur_second: 0,
        points: trace.points,
        run_cur_second: elapsed_secs,
        start_time: trace.started_at_ms,
        user_id: config.user_id.clone(),
    }
}

/// Full run. Any pre-sign failure returns before the trace starts.
pub async fn run<E, C, P>(
    config: &Config,
    endpoint: &E,
    confirm: &mut C,
    pacer: P,
) -> Result<Outcome>
where
    E: Endpoint,
    C: Confirm + ?Sized,
    P: Pacer,
{
    info!("step 1: pre-sign");
    let Some(grant) = pre_sign(endpoint, confirm, config).await? else {
        warn!("pre-sign request cancelled by user");
        return Ok(Outcome::Declined(Step::PreSign));
    };

    info!(
        duration_seconds = config.duration_seconds,
        "step 2: generating location trace"
    );
    let mut generator = TraceGenerator::new(
        config.latitude,
        config.longitude,
        config.duration_seconds,
        config.beacon.clone(),
        pacer,
    );
    let trace = match generator.run().await {
        TraceOutcome::Finished(trace) => trace,
        TraceOutcome::Cancelled { generated } => {
            warn!(generated, "interrupted; no check-in will be sent");
            return Ok(Outcome::Interrupted);
        }
    };
    info!(points = trace.points.len(), "all data points generated");

    let record = build_record(config, trace);
    if !do_sign(endpoint, confirm, config, &grant, &record).await? {
        warn!("final check-in request cancelled by user");
        return Ok(Outcome::Declined(Step::DoSign));
    }
    info!("check-in successful");
    Ok(Outcome::Completed)
}

fn ensure_success(response: ApiResponse) -> Result<ApiResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(Error::CheckInRejected {
            code: response.code,
            msg: response.message().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeaderConfig;
    use crate::trace::SimulatedPacer;
    use crate::types::Beacon;
    use std::cell::RefCell;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000_000;

    fn config(duration_seconds: u64) -> Config {
        Config {
            api_url: "http://sportcampus.invalid/api/association/doSign".into(),
            user_id: "42".into(),
            utoken: "tok".into(),
            salt: "pepper".into(),
            ass_id: "1024".into(),
            duration_seconds,
            latitude: 30.5,
            longitude: 114.25,
            beacon: Beacon {
                major: "10001".into(),
                minor: "20002".into(),
                uuid: "FDA50693".into(),
            },
            headers: HeaderConfig {
                user_agent: "ua".into(),
                x_channel: "c".into(),
                package_name: "p".into(),
                xx_version: "x".into(),
                version_name: "v".into(),
                version_code: "1".into(),
                platform: "android".into(),
                drid: "d".into(),
                e20_header: "e".into(),
                uuid_header: "u".into(),
            },
        }
    }

    /// Answers each request from a script and records what it was sent.
    struct ScriptedEndpoint {
        replies: RefCell<Vec<Result<ApiResponse>>>,
        sent: RefCell<Vec<(SignedRequest, Duration)>>,
    }

    impl ScriptedEndpoint {
        fn new(replies: Vec<Result<ApiResponse>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: RefCell::new(replies),
                sent: RefCell::new(Vec::new()),
            }
        }

        fn sent_data(&self, i: usize) -> Value {
            serde_json::from_str(&self.sent.borrow()[i].0.data).unwrap()
        }
    }

    impl Endpoint for ScriptedEndpoint {
        fn url(&self) -> &str {
            "http://sportcampus.invalid/api/association/doSign"
        }

        async fn send(&self, request: &SignedRequest, timeout: Duration) -> Result<ApiResponse> {
            self.sent.borrow_mut().push((request.clone(), timeout));
            self.replies
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(Error::Protocol("no scripted reply".into())))
        }
    }

    fn reply(code: i64, data: Option<Value>) -> Result<ApiResponse> {
        Ok(ApiResponse {
            code,
            msg: Some(format!("msg {code}")),
            data,
        })
    }

    fn always_yes(_: &str, _: &str) -> bool {
        true
    }

    #[tokio::test]
    async fn happy_path_sends_both_steps() {
        let cfg = config(20);
        let endpoint = ScriptedEndpoint::new(vec![
            reply(200, Some(serde_json::json!({"pre_sign_id": 9876}))),
            reply(200, None),
        ]);
        let outcome = run(&cfg, &endpoint, &mut always_yes, SimulatedPacer::starting_at(T0))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed);

        let sent = endpoint.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, PRE_SIGN_TIMEOUT);
        assert_eq!(sent[1].1, DO_SIGN_TIMEOUT);
        drop(sent);

        let pre = endpoint.sent_data(0);
        assert_eq!(pre["sign_action"], "pre_sign");
        assert_eq!(pre["ass_id"], "1024");

        let fin = endpoint.sent_data(1);
        assert_eq!(fin["pre_sign_id"], "9876");
        assert_eq!(fin["nonce"], pre["nonce"]);

        let record: CheckInRecord = serde_json::from_str(fin["extra"].as_str().unwrap()).unwrap();
        assert_eq!(record.points.len(), 3);
        assert_eq!(record.start_time, T0);
        assert_eq!(record.history_time, T0 + 20_000);
        assert_eq!(record.end_time, (T0 + 20_000).to_string());
        assert_eq!(record.duration, 20);
        assert_eq!(record.run_cur_second, 20);
        assert_eq!(record.user_id, "42");
    }

    #[tokio::test]
    async fn rejected_pre_sign_never_reaches_do_sign() {
        let cfg = config(300);
        let endpoint = ScriptedEndpoint::new(vec![reply(401, None), reply(200, None)]);
        let pacer = SimulatedPacer::starting_at(T0);
        let err = run(&cfg, &endpoint, &mut always_yes, pacer).await.unwrap_err();
        match err {
            Error::CheckInRejected { code, msg } => {
                assert_eq!(code, 401);
                assert_eq!(msg, "msg 401");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(endpoint.sent.borrow().len(), 1);
    }

    #[tokio::test]
    async fn pre_sign_without_id_is_a_protocol_error() {
        let cfg = config(0);
        let endpoint = ScriptedEndpoint::new(vec![reply(200, Some(serde_json::json!({})))]);
        let err = run(&cfg, &endpoint, &mut always_yes, SimulatedPacer::starting_at(T0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(endpoint.sent.borrow().len(), 1);
    }

    #[tokio::test]
    async fn declined_gate_sends_nothing() {
        let cfg = config(0);
        let endpoint = ScriptedEndpoint::new(vec![]);
        let mut gate = |_: &str, _: &str| false;
        let outcome = run(&cfg, &endpoint, &mut gate, SimulatedPacer::starting_at(T0))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Declined(Step::PreSign));
        assert!(endpoint.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn declining_final_gate_skips_do_sign() {
        let cfg = config(10);
        let endpoint = ScriptedEndpoint::new(vec![reply(
            200,
            Some(serde_json::json!({"pre_sign_id": "abc"})),
        )]);
        let mut asked = 0;
        let mut gate = |_: &str, payload: &str| {
            asked += 1;
            !payload.contains("extra")
        };
        let outcome = run(&cfg, &endpoint, &mut gate, SimulatedPacer::starting_at(T0))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Declined(Step::DoSign));
        assert_eq!(asked, 2);
        assert_eq!(endpoint.sent.borrow().len(), 1);
    }

    #[tokio::test]
    async fn interrupt_during_trace_sends_no_record() {
        let cfg = config(300);
        let endpoint = ScriptedEndpoint::new(vec![
            reply(200, Some(serde_json::json!({"pre_sign_id": 1}))),
            reply(200, None),
        ]);
        let pacer = SimulatedPacer::starting_at(T0).cancel_on_wait(5);
        let outcome = run(&cfg, &endpoint, &mut always_yes, pacer).await.unwrap();
        assert_eq!(outcome, Outcome::Interrupted);
        assert_eq!(endpoint.sent.borrow().len(), 1);
    }

    #[tokio::test]
    async fn rejected_do_sign_surfaces_message() {
        let cfg = config(0);
        let endpoint = ScriptedEndpoint::new(vec![
            reply(200, Some(serde_json::json!({"pre_sign_id": 1}))),
            reply(500, None),
        ]);
        let err = run(&cfg, &endpoint, &mut always_yes, SimulatedPacer::starting_at(T0))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "server rejected request (code 500): msg 500");
    }

    #[test]
    fn record_round_trips_through_json() {
        let cfg = config(20);
        let trace = Trace {
            points: Vec::new(),
            started_at_ms: T0,
            ended_at_ms: T0 + 20_500,
        };
        let record = build_record(&cfg, trace);
        let value = serde_json::to_value(&record).unwrap();
        let text = canonical_json_string(&value, Layout::Compact).unwrap();
        assert!(text.starts_with(r#"{"ass_id":"1024","duration":20,"endTime":"1700000020500","#));
        let back: CheckInRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
        assert!(back.end_time.parse::<u64>().unwrap() >= back.start_time);
        assert_eq!(back.pause_cur_second, 0);
    }
}
