use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Args;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    Account, AssetAllocation, DEFAULT_ANNUAL_CONTRIBUTION, DEFAULT_TRIALS, ProjectionMilestone,
    RetirementAnalysis, RetirementGoals, SimulationConfig, SimulationInput, SimulationResult,
    analyze_retirement, project_milestones, run_simulation, validate_horizon, validate_input,
};

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, help = "Current portfolio value")]
    pub current_value: f64,
    #[arg(long = "years", help = "Years until retirement")]
    pub years_until_retirement: u32,
    #[arg(long, help = "Target annual retirement income in today's money")]
    pub target_income: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_ANNUAL_CONTRIBUTION,
        help = "Annual contribution until retirement"
    )]
    pub annual_contribution: f64,
    #[arg(long, default_value_t = 60.0, help = "Equity allocation in percent")]
    pub equity: f64,
    #[arg(long, default_value_t = 30.0, help = "Bond allocation in percent")]
    pub bonds: f64,
    #[arg(long, default_value_t = 5.0, help = "Real estate allocation in percent")]
    pub real_estate: f64,
    #[arg(long, default_value_t = 0.0, help = "Commodities allocation in percent")]
    pub commodities: f64,
    #[arg(long, default_value_t = 5.0, help = "Cash allocation in percent")]
    pub cash: f64,
    #[arg(long, default_value_t = DEFAULT_TRIALS)]
    pub trials: u32,
    #[arg(long, help = "Seed for reproducible runs; random when omitted")]
    pub seed: Option<u64>,
    #[arg(
        long,
        default_value_t = false,
        help = "Draw fresh randomness for the what-if scenarios instead of replaying the base trials"
    )]
    pub independent_scenarios: bool,
    #[arg(
        long,
        default_value_t = 40,
        help = "Current age, used to label projection milestones"
    )]
    pub current_age: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_value: Option<f64>,
    years_until_retirement: Option<u32>,
    target_income: Option<f64>,
    annual_contribution: Option<f64>,
    equity: Option<f64>,
    bonds: Option<f64>,
    real_estate: Option<f64>,
    commodities: Option<f64>,
    cash: Option<f64>,
    trials: Option<u32>,
    seed: Option<u64>,
    independent_scenarios: Option<bool>,
    current_age: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RetirementPayload {
    accounts: Vec<Account>,
    #[serde(alias = "preferences")]
    goals: RetirementGoals,
    trials: Option<u32>,
    seed: Option<u64>,
    independent_scenarios: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub input: SimulationInput,
    pub config: SimulationConfig,
    pub seed: Option<u64>,
    pub current_age: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    seed: Option<u64>,
    allocation: AssetAllocation,
    simulation: SimulationResult,
    projections: Vec<ProjectionMilestone>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetirementResponse {
    seed: Option<u64>,
    #[serde(flatten)]
    analysis: RetirementAnalysis,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn build_request(args: SimulateArgs) -> Result<SimulationRequest, String> {
    if args.trials == 0 {
        return Err("--trials must be > 0".to_string());
    }

    let weights = [
        ("--equity", args.equity),
        ("--bonds", args.bonds),
        ("--real-estate", args.real_estate),
        ("--commodities", args.commodities),
        ("--cash", args.cash),
    ];
    for (flag, pct) in weights {
        if !(0.0..=100.0).contains(&pct) {
            return Err(format!("{flag} must be between 0 and 100"));
        }
    }

    let input = SimulationInput {
        current_portfolio_value: args.current_value,
        years_until_retirement: args.years_until_retirement,
        target_annual_income: args.target_income,
        annual_contribution: args.annual_contribution,
        allocation: AssetAllocation {
            equity: args.equity / 100.0,
            bonds: args.bonds / 100.0,
            real_estate: args.real_estate / 100.0,
            commodities: args.commodities / 100.0,
            cash: args.cash / 100.0,
        },
    };
    let config = SimulationConfig {
        num_trials: args.trials,
        paired_scenarios: !args.independent_scenarios,
    };
    validate_input(&input, config).map_err(|e| e.to_string())?;
    validate_horizon(args.current_age, args.years_until_retirement).map_err(|e| e.to_string())?;

    Ok(SimulationRequest {
        input,
        config,
        seed: args.seed,
        current_age: args.current_age,
    })
}

pub fn simulate(request: &SimulationRequest) -> Result<SimulateResponse, String> {
    let mut rng = seeded_rng(request.seed);
    let simulation =
        run_simulation(&request.input, request.config, &mut rng).map_err(|e| e.to_string())?;
    Ok(SimulateResponse {
        seed: request.seed,
        allocation: request.input.allocation,
        simulation,
        projections: project_milestones(&request.input, request.current_age),
    })
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "retirement projection API listening");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/retirement", post(retirement_handler))
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    payload: Result<Query<SimulatePayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => simulate_handler_impl(payload).await,
        Err(rejection) => rejected_payload(&rejection.body_text()),
    }
}

async fn simulate_post_handler(payload: Result<Json<SimulatePayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => simulate_handler_impl(payload).await,
        Err(rejection) => rejected_payload(&rejection.body_text()),
    }
}

fn rejected_payload(msg: &str) -> Response {
    warn!(error = %msg, "rejected malformed payload");
    error_response(StatusCode::BAD_REQUEST, msg)
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match build_request(args_from_payload(payload)) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected simulation request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match simulate(&request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn retirement_handler(payload: Result<Json<RetirementPayload>, JsonRejection>) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejected_payload(&rejection.body_text()),
    };
    let config = SimulationConfig {
        num_trials: payload.trials.unwrap_or(DEFAULT_TRIALS),
        paired_scenarios: !payload.independent_scenarios.unwrap_or(false),
    };
    let mut rng = seeded_rng(payload.seed);

    match analyze_retirement(&payload.accounts, payload.goals, config, &mut rng) {
        Ok(analysis) => json_response(
            StatusCode::OK,
            RetirementResponse {
                seed: payload.seed,
                analysis,
            },
        ),
        Err(e) => {
            warn!(error = %e, "rejected retirement analysis request");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn args_from_payload(payload: SimulatePayload) -> SimulateArgs {
    let mut args = default_args_for_api();

    if let Some(v) = payload.current_value {
        args.current_value = v;
    }
    if let Some(v) = payload.years_until_retirement {
        args.years_until_retirement = v;
    }
    if let Some(v) = payload.target_income {
        args.target_income = v;
    }
    if let Some(v) = payload.annual_contribution {
        args.annual_contribution = v;
    }
    if let Some(v) = payload.equity {
        args.equity = v;
    }
    if let Some(v) = payload.bonds {
        args.bonds = v;
    }
    if let Some(v) = payload.real_estate {
        args.real_estate = v;
    }
    if let Some(v) = payload.commodities {
        args.commodities = v;
    }
    if let Some(v) = payload.cash {
        args.cash = v;
    }
    if let Some(v) = payload.trials {
        args.trials = v;
    }
    if payload.seed.is_some() {
        args.seed = payload.seed;
    }
    if let Some(v) = payload.independent_scenarios {
        args.independent_scenarios = v;
    }
    if let Some(v) = payload.current_age {
        args.current_age = v;
    }

    args
}

fn default_args_for_api() -> SimulateArgs {
    SimulateArgs {
        current_value: 100_000.0,
        years_until_retirement: 25,
        target_income: 75_000.0,
        annual_contribution: DEFAULT_ANNUAL_CONTRIBUTION,
        equity: 60.0,
        bonds: 30.0,
        real_estate: 5.0,
        commodities: 0.0,
        cash: 5.0,
        trials: DEFAULT_TRIALS,
        seed: None,
        independent_scenarios: false,
        current_age: 40,
    }
}
