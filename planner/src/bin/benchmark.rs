use std::path::{Path, PathBuf};

use dronerouting_structs::plan::ObjectiveVector;

#[cfg(not(feature = "prof"))]
pub fn main() {
    println!("benchmarks not supported -- enable 'prof' crate feature")
}

/// Largest instance handed to the exact solver.
const MAX_EXACT_CLIENTS: usize = 12;

struct MethodResult {
    method: &'static str,
    ok: bool,
    time: f64,
    order: String,
    objective: Option<ObjectiveVector>,
    frontier_size: Option<usize>,
}

struct InstanceResult {
    name: String,
    clients: usize,
    methods: Vec<MethodResult>,
}

fn get_instance_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut filenames = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|e| e.extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();
    filenames.sort();
    Ok(filenames)
}

fn write_csv(path: &Path, results: &[InstanceResult]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "instance",
        "n_clients",
        "method",
        "ok",
        "time_sec",
        "order",
        "distance",
        "risk",
        "recharges",
        "frontier_size",
    ])?;
    for instance in results {
        for result in instance.methods.iter() {
            let objective = |f: fn(&ObjectiveVector) -> String| {
                result.objective.as_ref().map(f).unwrap_or_default()
            };
            writer.write_record([
                instance.name.clone(),
                instance.clients.to_string(),
                result.method.to_string(),
                (result.ok as u8).to_string(),
                format!("{:.6}", result.time),
                result.order.clone(),
                objective(|o| format!("{:.6}", o.distance)),
                objective(|o| format!("{:.6}", o.risk)),
                objective(|o| o.recharges.to_string()),
                result
                    .frontier_size
                    .map(|n| n.to_string())
                    .unwrap_or_default(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(feature = "prof")]
pub fn main() {
    use dronerouting_planner::{
        build_graph, order_string, solve_exact, solve_heuristic, solve_metaheuristic,
        AnnealingParams, ApproxOutcome, ExactConfig, Graph, HeuristicStrategy, Weights,
    };
    use dronerouting_structs::problem::Instance;
    use std::time::Instant;

    let _ = env_logger::try_init();
    let mut args = std::env::args().skip(1);
    let instance_dir = PathBuf::from(args.next().unwrap_or_else(|| "instances".to_string()));
    let out_csv = PathBuf::from(args.next().unwrap_or_else(|| "results.csv".to_string()));

    println!("-------------------------------");
    println!("drone route planner benchmarking");
    println!("-------------------------------");
    println!();
    println!("  methods: nearest_feasible, greedy_weighted, simulated_annealing, exact_bb");
    println!("  instances: {}", instance_dir.display());
    println!("  csv: {}", out_csv.display());
    println!();

    let instance_files = match get_instance_files(&instance_dir) {
        Ok(files) if !files.is_empty() => files,
        Ok(_) => {
            println!("no json instances in {}", instance_dir.display());
            return;
        }
        Err(err) => {
            eprintln!("cannot read {}: {}", instance_dir.display(), err);
            std::process::exit(1);
        }
    };

    let approx_result =
        |method: &'static str, graph: &Graph, time: f64, outcome: Option<ApproxOutcome>| {
            MethodResult {
                method,
                ok: outcome.is_some(),
                time,
                order: outcome
                    .as_ref()
                    .map(|o| order_string(graph, o.order()))
                    .unwrap_or_default(),
                objective: outcome.map(|o| o.objective),
                frontier_size: None,
            }
        };

    let mut results: Vec<InstanceResult> = Vec::new();
    println!("# RUNNING {} INSTANCES", instance_files.len());
    for filename in instance_files.iter() {
        let _p = hprof::enter("instance");
        let name = filename
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let graph = {
            let _p = hprof::enter("read");
            let instance = match Instance::from_json_file(filename) {
                Ok(instance) => instance,
                Err(err) => {
                    println!(" * instance {}: {}", name, err);
                    continue;
                }
            };
            match build_graph(&instance) {
                Ok(graph) => graph,
                Err(err) => {
                    println!(" * instance {}: {}", name, err);
                    continue;
                }
            }
        };
        let n_clients = graph.clients().len();
        println!(
            " * instance {} with {} clients {} recharge stations",
            name,
            n_clients,
            graph.recharges().len()
        );
        let mut methods = Vec::new();

        println!("   - solving with: \"nearest_feasible\"");
        let t0 = Instant::now();
        let nearest = solve_heuristic(&graph, HeuristicStrategy::NearestFeasible);
        let time = t0.elapsed().as_secs_f64();
        methods.push(approx_result("nearest_feasible", &graph, time, nearest));

        println!("   - solving with: \"greedy_weighted\"");
        let t0 = Instant::now();
        let strategy = HeuristicStrategy::GreedyWeighted(Weights::default());
        let greedy = solve_heuristic(&graph, strategy);
        let time = t0.elapsed().as_secs_f64();
        methods.push(approx_result("greedy_weighted", &graph, time, greedy));

        println!("   - solving with: \"simulated_annealing\"");
        let t0 = Instant::now();
        let annealed = solve_metaheuristic(&graph, &AnnealingParams::default());
        let time = t0.elapsed().as_secs_f64();
        methods.push(approx_result("simulated_annealing", &graph, time, annealed));

        if n_clients <= MAX_EXACT_CLIENTS {
            println!("   - solving with: \"exact_bb\"");
            let t0 = Instant::now();
            let outcome = solve_exact(&graph, &ExactConfig::default());
            let time = t0.elapsed().as_secs_f64();
            log::info!("{}", outcome.statistics);
            let shortest = outcome.frontier.sorted().into_iter().next();
            methods.push(MethodResult {
                method: "exact_bb",
                ok: !outcome.frontier.is_empty(),
                time,
                order: shortest
                    .map(|m| order_string(&graph, m.route.client_order()))
                    .unwrap_or_default(),
                objective: shortest.map(|m| m.objective),
                frontier_size: Some(outcome.frontier.len()),
            });
        } else {
            println!("   - skipping \"exact_bb\" ({} clients)", n_clients);
        }

        results.push(InstanceResult {
            name,
            clients: n_clients,
            methods,
        });
    }
    println!();
    println!("# PROFILER");
    hprof::profiler().print_timing();
    println!();

    println!("# RESULTS");

    use std::io::Write;
    let table = Vec::new();
    let mut tablewriter = tabwriter::TabWriter::new(table);
    writeln!(
        &mut tablewriter,
        "instance\tclients\tmethod\tok\ttime\tdist\trisk\trch\tfront\torder"
    )
    .unwrap();
    writeln!(
        &mut tablewriter,
        "---\t---\t---\t---\t---\t---\t---\t---\t---\t---"
    )
    .unwrap();
    for instance in results.iter() {
        for result in instance.methods.iter() {
            let (distance, risk, recharges) = match &result.objective {
                Some(o) => (
                    format!("{:.2}", o.distance),
                    format!("{:.3}", o.risk),
                    o.recharges.to_string(),
                ),
                None => ("-".to_string(), "-".to_string(), "-".to_string()),
            };
            writeln!(
                &mut tablewriter,
                "{}\t{}\t{}\t{}\t{:.4}\t{}\t{}\t{}\t{}\t{}",
                instance.name,
                instance.clients,
                result.method,
                result.ok,
                result.time,
                distance,
                risk,
                recharges,
                result
                    .frontier_size
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                result.order
            )
            .unwrap();
        }
    }

    let written = String::from_utf8(tablewriter.into_inner().unwrap()).unwrap();
    println!("{}", written);

    if let Err(err) = write_csv(&out_csv, &results) {
        eprintln!("cannot write {}: {}", out_csv.display(), err);
        std::process::exit(1);
    }
    println!("wrote {}", out_csv.display());
}
