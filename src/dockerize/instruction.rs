use serde::{Deserialize, Serialize};
use std::fmt;

/// One build-instruction line (or comment) of the emitted container build document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "lowercase")]
pub enum Instruction {
    Comment(String),
    Blank,
    From {
        image: String,
        stage: Option<String>,
    },
    Workdir(String),
    Copy {
        from_stage: Option<String>,
        sources: Vec<String>,
        dest: String,
    },
    Run(String),
    Env(Vec<(String, String)>),
    Label(Vec<(String, String)>),
    Expose(u16),
    Entrypoint(Vec<String>),
    Cmd(Vec<String>),
}

impl Instruction {
    pub fn from_image(image: &str) -> Self {
        Instruction::From {
            image: image.to_string(),
            stage: None,
        }
    }

    pub fn stage(image: &str, stage: &str) -> Self {
        Instruction::From {
            image: image.to_string(),
            stage: Some(stage.to_string()),
        }
    }

    pub fn copy(sources: &[&str], dest: &str) -> Self {
        Instruction::Copy {
            from_stage: None,
            sources: sources.iter().map(|s| s.to_string()).collect(),
            dest: dest.to_string(),
        }
    }

    pub fn copy_from(stage: &str, source: &str, dest: &str) -> Self {
        Instruction::Copy {
            from_stage: Some(stage.to_string()),
            sources: vec![source.to_string()],
            dest: dest.to_string(),
        }
    }

    pub fn env(pairs: &[(&str, &str)]) -> Self {
        Instruction::Env(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Instruction::Comment(_) | Instruction::Blank => None,
            Instruction::From { .. } => Some("FROM"),
            Instruction::Workdir(_) => Some("WORKDIR"),
            Instruction::Copy { .. } => Some("COPY"),
            Instruction::Run(_) => Some("RUN"),
            Instruction::Env(_) => Some("ENV"),
            Instruction::Label(_) => Some("LABEL"),
            Instruction::Expose(_) => Some("EXPOSE"),
            Instruction::Entrypoint(_) => Some("ENTRYPOINT"),
            Instruction::Cmd(_) => Some("CMD"),
        }
    }
}

/// Double-quote a value for ENV/LABEL, escaping backslashes and quotes.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn exec_form(args: &[String]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| quote(a)).collect();
    format!("[{}]", quoted.join(", "))
}

fn key_values(keyword: &str, pairs: &[(String, String)], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", keyword)?;
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            write!(f, " \\\n   ")?;
        }
        write!(f, " {}={}", key, quote(value))?;
    }
    Ok(())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Comment(text) => write!(f, "# {}", text),
            Instruction::Blank => Ok(()),
            Instruction::From { image, stage } => match stage {
                Some(stage) => write!(f, "FROM {} AS {}", image, stage),
                None => write!(f, "FROM {}", image),
            },
            Instruction::Workdir(dir) => write!(f, "WORKDIR {}", dir),
            Instruction::Copy {
                from_stage,
                sources,
                dest,
            } => {
                write!(f, "COPY ")?;
                if let Some(stage) = from_stage {
                    write!(f, "--from={} ", stage)?;
                }
                write!(f, "{} {}", sources.join(" "), dest)
            }
            Instruction::Run(command) => write!(f, "RUN {}", command),
            Instruction::Env(pairs) => key_values("ENV", pairs, f),
            Instruction::Label(pairs) => key_values("LABEL", pairs, f),
            Instruction::Expose(port) => write!(f, "EXPOSE {}", port),
            Instruction::Entrypoint(args) => write!(f, "ENTRYPOINT {}", exec_form(args)),
            Instruction::Cmd(args) => write!(f, "CMD {}", exec_form(args)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(
            Instruction::stage("node:20-slim", "node-deps").to_string(),
            "FROM node:20-slim AS node-deps"
        );
        assert_eq!(
            Instruction::copy_from("node-deps", "/app/node_modules", "./node_modules").to_string(),
            "COPY --from=node-deps /app/node_modules ./node_modules"
        );
        assert_eq!(
            Instruction::Entrypoint(vec!["node".to_string(), "server.js".to_string()]).to_string(),
            r#"ENTRYPOINT ["node", "server.js"]"#
        );
    }

    #[test]
    fn test_label_values_are_escaped() {
        let label = Instruction::Label(vec![
            ("a".to_string(), "say \"hi\"".to_string()),
            ("b".to_string(), "x".to_string()),
        ]);
        assert_eq!(label.to_string(), "LABEL a=\"say \\\"hi\\\"\" \\\n    b=\"x\"");
    }
}
