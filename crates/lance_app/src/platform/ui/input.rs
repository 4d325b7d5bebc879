//! Line commands read from stdin. They stand in for the pointer and wheel
//! gestures of a graphical surface and feed the same messages.

use lance_core::ViewKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Press at a screen point; grabs the node under it, if any.
    Drag { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Release,
    /// Zoom around `anchor`, or around the viewport center when absent.
    Zoom {
        factor: f64,
        anchor: Option<(f64, f64)>,
    },
    Pan { dx: f64, dy: f64 },
    Resize { width: f64, height: f64 },
    OpenJob(String),
    OpenMesh,
    Close(ViewKind),
    Logout,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("`{0}` is not a number")]
    NotANumber(String),
    #[error("`{0}` must be greater than zero")]
    NotPositive(String),
}

pub const HELP: &str = "drag x y | move x y | release | zoom f [x y] | pan dx dy | \
                        resize w h | job <id> | mesh | close job|mesh | logout | quit";

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, InputError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb {
        "drag" => {
            let [x, y] = numbers(&args, "drag <x> <y>")?;
            Command::Drag { x, y }
        }
        "move" => {
            let [x, y] = numbers(&args, "move <x> <y>")?;
            Command::Move { x, y }
        }
        "release" => Command::Release,
        "zoom" => match args.len() {
            1 => Command::Zoom {
                factor: number(args[0])?,
                anchor: None,
            },
            3 => Command::Zoom {
                factor: number(args[0])?,
                anchor: Some((number(args[1])?, number(args[2])?)),
            },
            _ => return Err(InputError::Usage("zoom <factor> [<x> <y>]")),
        },
        "pan" => {
            let [dx, dy] = numbers(&args, "pan <dx> <dy>")?;
            Command::Pan { dx, dy }
        }
        "resize" => {
            let [width, height] = numbers(&args, "resize <width> <height>")?;
            positive(args[0], width)?;
            positive(args[1], height)?;
            Command::Resize { width, height }
        }
        "job" => match args.as_slice() {
            [id] => Command::OpenJob((*id).to_string()),
            _ => return Err(InputError::Usage("job <id>")),
        },
        "mesh" => Command::OpenMesh,
        "close" => match args.as_slice() {
            ["job"] => Command::Close(ViewKind::JobTracker),
            ["mesh"] => Command::Close(ViewKind::Mesh),
            _ => return Err(InputError::Usage("close job|mesh")),
        },
        "logout" => Command::Logout,
        "quit" | "exit" => Command::Quit,
        other => return Err(InputError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn number(raw: &str) -> Result<f64, InputError> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| InputError::NotANumber(raw.to_string()))
}

fn positive(raw: &str, value: f64) -> Result<(), InputError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(InputError::NotPositive(raw.to_string()))
    }
}

fn numbers(args: &[&str], usage: &'static str) -> Result<[f64; 2], InputError> {
    match args {
        [a, b] => Ok([number(a)?, number(b)?]),
        _ => Err(InputError::Usage(usage)),
    }
}
