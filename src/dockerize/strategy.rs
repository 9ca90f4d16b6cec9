//! The three build strategies. Each renders the complete instruction list; the shared tail
//! (directories, sources, environment, labels, entry point) is identical in shape.

use super::instruction::Instruction;
use super::{BuildContext, StrategyKind, APP_DIR, MODULE_DIRS};

pub trait BuildStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn instructions(&self, ctx: &BuildContext<'_>) -> Vec<Instruction>;
}

pub fn strategy_for(kind: StrategyKind) -> Box<dyn BuildStrategy> {
    match kind {
        StrategyKind::SingleRuntimeNode => Box::new(NodeStrategy),
        StrategyKind::SingleRuntimePython => Box::new(PythonStrategy),
        StrategyKind::MultiStage => Box::new(MultiStageStrategy),
    }
}

const NPM_INSTALL: &str =
    "npm install --omit=dev --no-audit --no-fund && npm cache clean --force";
const PIP_INSTALL: &str = "pip install --no-cache-dir --disable-pip-version-check -r requirements.txt";

fn header(ctx: &BuildContext<'_>, kind: StrategyKind) -> Vec<Instruction> {
    vec![
        Instruction::Comment(format!(
            "{} {} ({} build)",
            ctx.manifest.name, ctx.manifest.version, kind
        )),
        Instruction::Comment(format!(
            "Generated by toolforge {}",
            ctx.manifest.metadata.generator_version
        )),
        Instruction::Blank,
    ]
}

/// Working directories, module sources, runtime environment, labels and entry point.
fn runtime_tail(ctx: &BuildContext<'_>, env: &[(&str, &str)], entrypoint: &[&str]) -> Vec<Instruction> {
    let dirs: Vec<String> = MODULE_DIRS
        .iter()
        .map(|d| format!("{}/{}", APP_DIR, d))
        .collect();

    let mut out = vec![
        Instruction::Run(format!("mkdir -p {}", dirs.join(" "))),
        Instruction::Blank,
    ];
    for dir in MODULE_DIRS {
        out.push(Instruction::copy(&[format!("{}/", dir).as_str()], &format!("./{}/", dir)));
    }
    out.push(Instruction::Blank);

    let mut env_pairs: Vec<(&str, &str)> = env.to_vec();
    env_pairs.push(("MCP_CONFIG_PATH", "/app/config/config.yaml"));
    env_pairs.push(("MCP_MANIFEST_PATH", "/app/generated/manifest.json"));
    out.push(Instruction::env(&env_pairs));

    let manifest = ctx.manifest;
    out.push(Instruction::Label(vec![
        ("org.opencontainers.image.title".to_string(), manifest.name.clone()),
        ("org.opencontainers.image.version".to_string(), manifest.version.clone()),
        (
            "org.opencontainers.image.created".to_string(),
            manifest.metadata.generated_at.to_rfc3339(),
        ),
        ("io.toolforge.tools".to_string(), manifest.tool_names().join(",")),
        (
            "io.toolforge.connectors".to_string(),
            manifest.connector_names().join(","),
        ),
        ("io.toolforge.strategy".to_string(), ctx.kind.to_string()),
    ]));
    out.push(Instruction::Blank);

    out.push(Instruction::Expose(ctx.config.port));
    out.push(Instruction::Entrypoint(
        entrypoint.iter().map(|s| s.to_string()).collect(),
    ));
    out.push(Instruction::Cmd(vec![
        "--config".to_string(),
        "/app/config/config.yaml".to_string(),
    ]));
    out
}

pub struct NodeStrategy;

impl BuildStrategy for NodeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SingleRuntimeNode
    }

    fn instructions(&self, ctx: &BuildContext<'_>) -> Vec<Instruction> {
        let mut out = header(ctx, self.kind());
        out.extend([
            Instruction::from_image(&ctx.config.node_image),
            Instruction::Workdir(APP_DIR.to_string()),
            Instruction::Blank,
            Instruction::copy(&["package.json"], "./"),
            Instruction::Run(NPM_INSTALL.to_string()),
            Instruction::Blank,
        ]);
        out.extend(runtime_tail(
            ctx,
            &[("NODE_ENV", "production")],
            &["node", "/app/generated/server.js"],
        ));
        out
    }
}

pub struct PythonStrategy;

impl BuildStrategy for PythonStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SingleRuntimePython
    }

    fn instructions(&self, ctx: &BuildContext<'_>) -> Vec<Instruction> {
        let mut out = header(ctx, self.kind());
        out.extend([
            Instruction::from_image(&ctx.config.python_image),
            Instruction::Workdir(APP_DIR.to_string()),
            Instruction::env(&[("PYTHONDONTWRITEBYTECODE", "1"), ("PYTHONUNBUFFERED", "1")]),
            Instruction::Blank,
            Instruction::copy(&["requirements.txt"], "./"),
            Instruction::Run(PIP_INSTALL.to_string()),
            Instruction::Blank,
        ]);
        out.extend(runtime_tail(
            ctx,
            &[("PYTHON_ENV", "production")],
            &["python", "-m", "generated.server"],
        ));
        out
    }
}

/// Both runtimes: dependencies install in their own stages and the final image is based on
/// the Python runtime with Node copied in.
pub struct MultiStageStrategy;

impl BuildStrategy for MultiStageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MultiStage
    }

    fn instructions(&self, ctx: &BuildContext<'_>) -> Vec<Instruction> {
        let mut out = header(ctx, self.kind());
        out.extend([
            Instruction::stage(&ctx.config.node_image, "node-deps"),
            Instruction::Workdir(APP_DIR.to_string()),
            Instruction::copy(&["package.json"], "./"),
            Instruction::Run(NPM_INSTALL.to_string()),
            Instruction::Blank,
            Instruction::stage(&ctx.config.python_image, "python-deps"),
            Instruction::Workdir(APP_DIR.to_string()),
            Instruction::copy(&["requirements.txt"], "./"),
            Instruction::Run(format!("{} --prefix=/install", PIP_INSTALL)),
            Instruction::Blank,
            Instruction::from_image(&ctx.config.python_image),
            Instruction::Workdir(APP_DIR.to_string()),
            Instruction::env(&[("PYTHONDONTWRITEBYTECODE", "1"), ("PYTHONUNBUFFERED", "1")]),
            Instruction::copy_from("node-deps", "/usr/local/bin/node", "/usr/local/bin/node"),
            Instruction::copy_from("node-deps", "/app/node_modules", "./node_modules"),
            Instruction::copy_from("python-deps", "/install", "/usr/local"),
            Instruction::copy(&["package.json", "requirements.txt"], "./"),
            Instruction::Blank,
        ]);
        out.extend(runtime_tail(
            ctx,
            &[("NODE_ENV", "production"), ("PYTHON_ENV", "production")],
            &["node", "/app/generated/server.js"],
        ));
        out
    }
}
