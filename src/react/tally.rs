//! TallyAgent：无 LLM 时的规则汇总 Agent
//!
//! 从指令中提取 `- <food> (<quantity>, <size/type>)` 行，对每个不同条目调用一次 nutrition_fetch，
//! 累加 Nutritionix `foods[]` 中的 nf_calories / nf_protein。查询失败的条目标记为 unavailable，不计入合计。
//! 追问中带条目行时，与上下文中的先前明细合并：同名条目重新查询并替换，新条目追加，合计重新计算。
//! 指令中没有条目行时（如普通追问），返回先前的分析结果。

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::agent::{AgentInstruction, ReasoningAgent};
use crate::core::AgentError;
use crate::tools::ToolExecutor;

const NUTRITION_TOOL: &str = "nutrition_fetch";

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-*•]\s+(.+?)\s*$").expect("valid regex"))
}

fn item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<name>[^()]+?)\s*\((?P<detail>[^)]*)\)").expect("valid regex"))
}

fn rendered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^- (?P<query>.+?): (?:(?P<cal>\d+(?:\.\d+)?) kcal, (?P<protein>\d+(?:\.\d+)?) g protein|unavailable \((?P<reason>.*)\))$",
        )
        .expect("valid regex")
    })
}

/// 一个条目：食物名 + 查询串
#[derive(Debug, Clone, PartialEq)]
struct FoodItem {
    name: String,
    query: String,
}

/// `banana (2, medium)` → `2 medium banana`；无括号时原样返回
fn parse_item(line: &str) -> FoodItem {
    match item_re().captures(line) {
        Some(caps) => {
            let name = caps["name"].trim();
            let mut parts: Vec<&str> = caps["detail"]
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            parts.push(name);
            FoodItem {
                name: name.to_string(),
                query: parts.join(" "),
            }
        }
        None => FoodItem {
            name: line.trim().to_string(),
            query: line.trim().to_string(),
        },
    }
}

fn extract_food_items(text: &str) -> Vec<FoodItem> {
    let mut seen = Vec::<String>::new();
    let mut items = Vec::new();
    for line in text.lines() {
        let Some(caps) = bullet_re().captures(line) else {
            continue;
        };
        let item = parse_item(&caps[1]);
        let key = item.query.to_lowercase();
        if item.query.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        items.push(item);
    }
    items
}

/// 提取去重后的条目查询，保持出现顺序
pub fn extract_food_queries(text: &str) -> Vec<String> {
    extract_food_items(text).into_iter().map(|item| item.query).collect()
}

/// 单个条目的查询结果
#[derive(Debug, Clone, PartialEq)]
enum ItemOutcome {
    Found { calories: f64, protein: f64 },
    Unavailable(String),
}

/// 从 Nutritionix 响应中累加热量与蛋白质
fn sum_foods(payload: &Value) -> ItemOutcome {
    if let Some(err) = payload.get("error") {
        let reason = match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return ItemOutcome::Unavailable(reason);
    }
    let Some(foods) = payload.get("foods").and_then(|f| f.as_array()).filter(|f| !f.is_empty()) else {
        return ItemOutcome::Unavailable("no nutrition data".to_string());
    };
    let field = |food: &Value, key: &str| food.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
    ItemOutcome::Found {
        calories: foods.iter().map(|f| field(f, "nf_calories")).sum(),
        protein: foods.iter().map(|f| field(f, "nf_protein")).sum(),
    }
}

/// 解析先前渲染的明细（合计行除外）；不是本格式的文本返回空
fn parse_rendered(text: &str) -> Vec<(String, ItemOutcome)> {
    text.lines()
        .filter_map(|line| rendered_re().captures(line.trim()))
        .filter(|caps| &caps["query"] != "Total")
        .map(|caps| {
            let outcome = match caps.name("reason") {
                Some(reason) => ItemOutcome::Unavailable(reason.as_str().to_string()),
                None => ItemOutcome::Found {
                    calories: caps["cal"].parse().unwrap_or(0.0),
                    protein: caps["protein"].parse().unwrap_or(0.0),
                },
            };
            (caps["query"].to_string(), outcome)
        })
        .collect()
}

/// 先前条目的查询串以同一食物名结尾时视为同一条目
fn same_food(prior_query: &str, name: &str) -> bool {
    let prior = prior_query.to_lowercase();
    let name = name.to_lowercase();
    prior == name || prior.ends_with(&format!(" {name}"))
}

fn render(items: &[(String, ItemOutcome)]) -> String {
    let mut lines = Vec::new();
    let (mut total_cal, mut total_protein, mut missing) = (0.0, 0.0, 0usize);
    for (query, outcome) in items {
        match outcome {
            ItemOutcome::Found { calories, protein } => {
                total_cal += calories;
                total_protein += protein;
                lines.push(format!("- {query}: {calories:.0} kcal, {protein:.1} g protein"));
            }
            ItemOutcome::Unavailable(reason) => {
                missing += 1;
                lines.push(format!("- {query}: unavailable ({reason})"));
            }
        }
    }
    let mut total = format!("- Total: {total_cal:.0} kcal, {total_protein:.1} g protein");
    if missing > 0 {
        total.push_str(&format!(
            " (excluding {missing} unavailable item{})",
            if missing == 1 { "" } else { "s" }
        ));
    }
    lines.push(total);
    lines.join("\n")
}

/// 规则汇总 Agent
#[derive(Debug, Default)]
pub struct TallyAgent;

impl TallyAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReasoningAgent for TallyAgent {
    async fn run(&self, instruction: &AgentInstruction, tools: &ToolExecutor) -> Result<String, AgentError> {
        let new_items = extract_food_items(&instruction.prompt);
        if new_items.is_empty() {
            return Ok(match &instruction.context {
                Some(ctx) => format!("No language model is configured, so here is the latest analysis:\n{ctx}"),
                None => "No food items found to analyze.".to_string(),
            });
        }

        let has_tool = tools.get_tool(NUTRITION_TOOL).is_some();
        let mut items = instruction.context.as_deref().map(parse_rendered).unwrap_or_default();
        for item in new_items {
            let outcome = if has_tool {
                match tools.execute(NUTRITION_TOOL, json!({ "query": item.query })).await {
                    Ok(payload) => sum_foods(&payload),
                    Err(e) => ItemOutcome::Unavailable(e.to_string()),
                }
            } else {
                ItemOutcome::Unavailable("nutrition tool unavailable".to_string())
            };
            match items.iter_mut().find(|(prior, _)| same_food(prior, &item.name)) {
                Some(slot) => *slot = (item.query, outcome),
                None => items.push((item.query, outcome)),
            }
        }
        Ok(render(&items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolRegistry};

    const LISTING: &str = "Food Items:\n- banana (2, medium)\n- apple (1, large)\n- Banana (2, medium)\n- toast";

    #[test]
    fn test_extract_food_queries() {
        assert_eq!(
            extract_food_queries(LISTING),
            vec!["2 medium banana", "1 large apple", "toast"]
        );
        assert!(extract_food_queries("This is not a food image.").is_empty());
    }

    #[test]
    fn test_sum_foods() {
        let payload = json!({"foods": [
            {"nf_calories": 100.0, "nf_protein": 1.0},
            {"nf_calories": 50.5, "nf_protein": 0.5}
        ]});
        assert_eq!(sum_foods(&payload), ItemOutcome::Found { calories: 150.5, protein: 1.5 });
        assert_eq!(
            sum_foods(&json!({"error": "unauthorized"})),
            ItemOutcome::Unavailable("unauthorized".to_string())
        );
        assert!(matches!(sum_foods(&json!({"foods": []})), ItemOutcome::Unavailable(_)));
    }

    struct Nutritionix;

    #[async_trait]
    impl Tool for Nutritionix {
        fn name(&self) -> &str {
            NUTRITION_TOOL
        }

        fn description(&self) -> &str {
            "stub"
        }

        async fn execute(&self, args: Value) -> Result<Value, String> {
            Ok(match args["query"].as_str().unwrap_or("") {
                "2 medium banana" => json!({"foods": [{"nf_calories": 210.0, "nf_protein": 2.6}]}),
                "toast" => json!({"foods": [{"nf_calories": 75.0, "nf_protein": 2.5}]}),
                "1 cup yogurt" => json!({"foods": [{"nf_calories": 150.0, "nf_protein": 8.5}]}),
                "3 small banana" => json!({"foods": [{"nf_calories": 270.0, "nf_protein": 3.3}]}),
                _ => json!({"error": "We couldn't match any of your foods"}),
            })
        }
    }

    #[tokio::test]
    async fn test_partial_failure_still_totals_fetched_items() {
        let mut registry = ToolRegistry::new();
        registry.register(Nutritionix);
        let tools = ToolExecutor::new(registry, 5);

        let out = TallyAgent
            .run(&AgentInstruction::new("sys", LISTING), &tools)
            .await
            .unwrap();
        assert_eq!(
            out,
            "- 2 medium banana: 210 kcal, 2.6 g protein\n\
             - 1 large apple: unavailable (We couldn't match any of your foods)\n\
             - toast: 75 kcal, 2.5 g protein\n\
             - Total: 285 kcal, 5.1 g protein (excluding 1 unavailable item)"
        );
    }

    fn stub_tools() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Nutritionix);
        ToolExecutor::new(registry, 5)
    }

    const PRIOR: &str = "- 2 medium banana: 210 kcal, 2.6 g protein\n\
                         - 1 large apple: unavailable (We couldn't match any of your foods)\n\
                         - toast: 75 kcal, 2.5 g protein\n\
                         - Total: 285 kcal, 5.1 g protein (excluding 1 unavailable item)";

    #[test]
    fn test_parse_rendered_skips_total_and_prose() {
        let items = parse_rendered(&format!("Here you go:\n{PRIOR}"));
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], ("2 medium banana".to_string(), ItemOutcome::Found { calories: 210.0, protein: 2.6 }));
        assert!(matches!(&items[1].1, ItemOutcome::Unavailable(r) if r.starts_with("We couldn't")));
    }

    #[tokio::test]
    async fn test_follow_up_item_updates_prior_totals() {
        let ins = AgentInstruction::new("sys", "User question: I also had\n- yogurt (1, cup)").with_context(PRIOR);
        let out = TallyAgent.run(&ins, &stub_tools()).await.unwrap();
        assert_eq!(
            out,
            "- 2 medium banana: 210 kcal, 2.6 g protein\n\
             - 1 large apple: unavailable (We couldn't match any of your foods)\n\
             - toast: 75 kcal, 2.5 g protein\n\
             - 1 cup yogurt: 150 kcal, 8.5 g protein\n\
             - Total: 435 kcal, 13.6 g protein (excluding 1 unavailable item)"
        );
    }

    #[tokio::test]
    async fn test_correction_replaces_same_food() {
        let ins = AgentInstruction::new("sys", "User question: actually\n- banana (3, small)").with_context(PRIOR);
        let out = TallyAgent.run(&ins, &stub_tools()).await.unwrap();
        assert!(out.starts_with("- 3 small banana: 270 kcal, 3.3 g protein\n"));
        assert!(!out.contains("2 medium banana"));
        assert!(out.ends_with("- Total: 345 kcal, 5.8 g protein (excluding 1 unavailable item)"));
    }

    #[tokio::test]
    async fn test_without_tools() {
        let out = TallyAgent
            .run(&AgentInstruction::new("sys", "- egg (1, boiled)"), &ToolExecutor::empty(5))
            .await
            .unwrap();
        assert!(out.contains("1 boiled egg: unavailable (nutrition tool unavailable)"));
        assert!(out.ends_with("(excluding 1 unavailable item)"));
    }

    #[tokio::test]
    async fn test_follow_up_returns_context() {
        let ins = AgentInstruction::new("sys", "User question: is this healthy?").with_context("- Total: 285 kcal");
        let out = TallyAgent.run(&ins, &ToolExecutor::empty(5)).await.unwrap();
        assert!(out.ends_with("- Total: 285 kcal"));
    }
}
