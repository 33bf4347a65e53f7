//! Text report types: a Markdown document for humans and a JSON value
//! for automated tooling, both built from a `RunOutput`.

use std::fmt::{Display, Formatter};
use std::time::SystemTime;

use humantime::format_rfc3339_seconds;
use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::RunOutput;

pub struct Markdown<'a>(pub &'a RunOutput);

impl Markdown<'_> {
    fn md_escape(str: &str) -> String {
        str.replace('|', r"\|")
            .replace('_', r"\_")
            .replace('*', r"\*")
            .replace('[', r"\[")
            .replace(']', r"\]")
    }
}

impl Display for Markdown<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = self.0;
        let file_name = &output.file_info.name;
        let map_name = &output.game.map_name;

        writeln!(f, "# Summary: {file_name} on {map_name}\n")?;
        writeln!(f, "- File path: `{}`", output.file_info.path)?;
        writeln!(
            f,
            "- File created at: {}",
            format_rfc3339_seconds(output.file_info.created_at)
        )?;
        writeln!(f, "- Total moves: {}", output.game.total_moves)?;
        let app_version = env!("CARGO_PKG_VERSION");
        writeln!(f, "- Analyzer version: {app_version}")?;
        writeln!(
            f,
            "- Report created at: {}\n",
            format_rfc3339_seconds(SystemTime::now())
        )?;

        writeln!(f, "## Players\n")?;
        let mut table_builder = Builder::default();
        table_builder.push_record(["Number", "Name", "Side", "Color", "Cheats", "Time to Die"]);
        for player in &output.game.players {
            let ttd = output
                .analysis
                .time_to_die
                .get(player.number.saturating_sub(1) as usize)
                .copied()
                .unwrap_or(0);
            table_builder.push_record([
                player.number.to_string(),
                Self::md_escape(&player.name),
                player.side.to_string(),
                player.color.to_string(),
                player.cheats().to_string(),
                ttd.to_string(),
            ]);
        }
        let mut table = table_builder.build();
        table.with(Style::markdown());
        writeln!(f, "{table}\n")?;

        if !output.analysis.foul_play.is_empty() {
            writeln!(f, "## Foul Play\n")?;
            let senders: Vec<String> = output
                .analysis
                .foul_play
                .iter()
                .map(|s| s.to_string())
                .collect();
            writeln!(f, "Flagged senders: {}\n", senders.join(", "))?;
        }

        writeln!(f, "## Final Scores\n")?;
        let mut table_builder = Builder::default();
        table_builder.push_record([
            "Sender",
            "Status",
            "Kills",
            "Losses",
            "Commander Kills",
            "Commander Losses",
            "Metal",
            "Energy",
        ]);
        for score in &output.analysis.final_scores {
            table_builder.push_record([
                score.sender.to_string(),
                score.status.to_string(),
                score.kills.to_string(),
                score.losses.to_string(),
                score.com_kills.to_string(),
                score.com_losses.to_string(),
                format!("{:.1}", score.metal_total),
                format!("{:.1}", score.energy_total),
            ]);
        }
        let mut table = table_builder.build();
        table.with(Style::markdown());
        writeln!(f, "{table}\n")?;

        writeln!(f, "## Unit Counts\n")?;
        let mut table_builder = Builder::default();
        table_builder.push_record(["Sender", "Unit Type", "Count", "First Seen (ms)"]);
        for row in &output.analysis.unit_counts {
            let unit_type = match output.unit_catalog.name(row.net_id) {
                Some(name) => Self::md_escape(name),
                None => row.net_id.to_string(),
            };
            table_builder.push_record([
                row.sender.to_string(),
                unit_type,
                row.count.to_string(),
                row.first_seen_ms.to_string(),
            ]);
        }
        let mut table = table_builder.build();
        table.with(Style::markdown());
        writeln!(f, "{table}")?;

        if !output.analysis.allies.is_empty() {
            writeln!(f, "\n## Detected Alliances\n")?;
            let allies: Vec<String> = output
                .analysis
                .allies
                .iter()
                .map(|i| i.to_string())
                .collect();
            writeln!(f, "Player indices allied with the host: {}", allies.join(", "))?;
        }

        Ok(())
    }
}

pub struct Json<'a>(pub &'a RunOutput);

impl From<Json<'_>> for Value {
    fn from(value: Json<'_>) -> Self {
        let output = value.0;

        let players: Vec<Value> = output
            .game
            .players
            .iter()
            .map(|player| {
                let ttd = output
                    .analysis
                    .time_to_die
                    .get(player.number.saturating_sub(1) as usize)
                    .copied()
                    .unwrap_or(0);

                json!({
                    "number": player.number,
                    "name": player.name,
                    "side": player.side,
                    "color": player.color,
                    "cheats": player.cheats(),
                    "time_to_die_ms": ttd,
                })
            })
            .collect();

        let final_scores: Vec<Value> = output
            .analysis
            .final_scores
            .iter()
            .map(|score| {
                json!({
                    "sender": score.sender,
                    "status": score.status,
                    "kills": score.kills,
                    "losses": score.losses,
                    "com_kills": score.com_kills,
                    "com_losses": score.com_losses,
                    "metal_total": score.metal_total,
                    "energy_total": score.energy_total,
                })
            })
            .collect();

        let unit_counts: Vec<Value> = output
            .analysis
            .unit_counts
            .iter()
            .map(|row| {
                json!({
                    "sender": row.sender,
                    "net_id": row.net_id,
                    "unit_name": output.unit_catalog.name(row.net_id),
                    "count": row.count,
                    "first_seen_ms": row.first_seen_ms,
                })
            })
            .collect();

        json!({
            "file": output.file_info.path,
            "map_name": output.game.map_name,
            "total_moves": output.game.total_moves,
            "players": players,
            "final_scores": final_scores,
            "foul_play": output.analysis.foul_play,
            "unit_counts": unit_counts,
            "allies": output.analysis.allies,
        })
    }
}

impl Display for Json<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let value: Value = Json(self.0).into();
        let str = serde_json::to_string_pretty(&value).map_err(|_| std::fmt::Error)?;
        f.write_str(&str)
    }
}
