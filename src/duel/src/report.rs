use duel_core::EntityId;

use crate::simulate::SimulationReport;

/// Print the leaderboard and summary of a simulation run.
pub fn print(report: &SimulationReport) {
    println!(
        "{:>4}  {:<12} {:>9} {:>9} {:>7} {:>7} {:>8}",
        "rank", "name", "hidden", "rating", "trials", "mean", "ucb"
    );
    for (rank, entity) in report.entities.iter().enumerate() {
        let ucb = entity
            .ucb_score
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {:<12} {:>9.1} {:>9.1} {:>7} {:>7.3} {:>8}",
            rank + 1,
            entity.name,
            entity.hidden_strength,
            entity.rating,
            entity.trials,
            entity.mean_reward,
            ucb
        );
    }
    println!();
    println!(
        "comparisons: {}  ties: {}  elapsed: {} ms",
        report.comparisons, report.ties, report.elapsed_ms
    );
    println!("rank correlation (spearman): {:.3}", report.rank_correlation);
    println!("{}", best_arm_line(report.best_arm));
}

fn best_arm_line(best_arm: Option<EntityId>) -> String {
    match best_arm {
        Some(id) => format!("greedy UCB1 arm: {id}"),
        None => "greedy UCB1 arm: none".to_string(),
    }
}
