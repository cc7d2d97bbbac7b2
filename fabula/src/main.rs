//! fabula - a dynamic text adventure in the terminal.
//!
//! Line-oriented presentation over the narrative engine: create a
//! protagonist, walk the story tree one numbered choice at a time, and
//! rate passages so the tree can grow where players want more.

use fabula_core::{
    Protagonist, SelectOutcome, SessionConfig, StorySession, TemplateLibrary,
    STARTING_SITUATIONS,
};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    print_welcome();

    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        println!("Note: ANTHROPIC_API_KEY is not set. The story will use only");
        println!("authored, cached and fallback content this session.\n");
    }

    let stdin = io::stdin();
    let mut input = Input {
        lines: stdin.lock().lines(),
    };

    let Some(protagonist) = create_protagonist(&mut input) else {
        println!("\nFarewell.");
        return;
    };

    println!("\nCharacter created: {}", protagonist.describe());

    if let Some(prologue) = offer_prologue(&mut input, &protagonist) {
        println!("\n{}", "-".repeat(60));
        println!("{prologue}");
    }

    println!("\nPress Enter to begin...");
    let _ = input.line();

    let config = SessionConfig::new(".");
    let mut session = match StorySession::new(config, protagonist).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to start the story: {e}");
            std::process::exit(1);
        }
    };

    game_loop(&mut session, &mut input).await;
    println!("\nThanks for playing.");
}

/// Buffered stdin lines with prompt helpers.
struct Input<'a> {
    lines: io::Lines<io::StdinLock<'a>>,
}

impl Input<'_> {
    /// Next line, trimmed. None on EOF or read error.
    fn line(&mut self) -> Option<String> {
        match self.lines.next() {
            Some(Ok(line)) => Some(line.trim().to_string()),
            Some(Err(e)) => {
                eprintln!("Error reading input: {e}");
                None
            }
            None => None,
        }
    }

    /// Print a prompt and read one line.
    fn prompt(&mut self, text: &str) -> Option<String> {
        print!("{text}");
        io::stdout().flush().ok();
        self.line()
    }
}

fn print_welcome() {
    println!("{}", "=".repeat(60));
    println!("                      F A B U L A");
    println!("            a story that grows as you play");
    println!("{}", "=".repeat(60));
    println!();
    println!("Your choices branch the story; your character's background");
    println!("shapes what is offered; your feedback decides where new");
    println!("branches grow.");
    println!();
}

fn create_protagonist(input: &mut Input<'_>) -> Option<Protagonist> {
    println!("First, your character.\n");

    let name = match input.prompt("Name: ")? {
        name if name.is_empty() => "Adventurer".to_string(),
        name => name,
    };

    println!("\nGender:");
    println!("  1. Male");
    println!("  2. Female");
    println!("  3. Non-binary");
    println!("  4. Other");
    let gender = match input.prompt("Choose (1-4): ")?.as_str() {
        "1" => "male",
        "2" => "female",
        "3" => "non-binary",
        _ => "other",
    }
    .to_string();

    let age = loop {
        let answer = input.prompt("\nAge (16-100): ")?;
        match answer.parse::<u8>() {
            Ok(age) if (16..=100).contains(&age) => break age,
            Ok(_) => println!("Age must be between 16 and 100."),
            Err(_) => println!("Please enter a number."),
        }
    };

    println!("\nStarting situation:");
    for (i, situation) in STARTING_SITUATIONS.iter().enumerate() {
        println!("  {}. {situation}", i + 1);
    }
    let situation = input
        .prompt("Choose (1-4): ")?
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| STARTING_SITUATIONS.get(i))
        .unwrap_or(&STARTING_SITUATIONS[0])
        .to_string();

    Some(Protagonist::new(name, gender, age, situation))
}

/// Offer a template-rendered prologue before the adventure proper.
fn offer_prologue(input: &mut Input<'_>, protagonist: &Protagonist) -> Option<String> {
    let answer = input.prompt("\nCustomized opening scene? (y/N): ")?;
    if !answer.eq_ignore_ascii_case("y") {
        return None;
    }

    let library = TemplateLibrary::new();
    println!("\nOpenings:");
    for (i, template) in library.templates().iter().enumerate() {
        println!("  {}. {} - {}", i + 1, template.title, template.description);
    }

    let template = input
        .prompt("Choose: ")?
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| library.templates().get(i))?;

    let mut values = HashMap::new();
    for variable in template.variables() {
        let hint = match &variable.kind {
            fabula_core::VariableKind::Choice { options } => options.join(" | "),
            fabula_core::VariableKind::Range { min, max } => format!("{min}-{max}"),
            fabula_core::VariableKind::Boolean => "true | false".to_string(),
            fabula_core::VariableKind::Text => "free text".to_string(),
        };
        let default = variable
            .default
            .as_deref()
            .map(|d| format!(", default {d}"))
            .unwrap_or_default();

        let answer = input.prompt(&format!(
            "{} ({hint}{default}): ",
            variable.description
        ))?;
        if !answer.is_empty() {
            values.insert(variable.name.clone(), answer);
        }
    }

    let errors = template.validate(&values);
    if !errors.is_empty() {
        for error in &errors {
            println!("  ! {error}");
        }
        println!("Skipping the customized opening.");
        return None;
    }

    Some(template.render(&values, Some(protagonist)))
}

async fn game_loop(session: &mut StorySession, input: &mut Input<'_>) {
    loop {
        println!("\n{}", "=".repeat(60));
        println!("{}", session.story());
        println!("{}", "-".repeat(40));

        let choices = session.choices().await;
        println!("\nWhat do you do?");
        for (i, choice) in choices.iter().enumerate() {
            println!("  {}. {choice}", i + 1);
        }

        let Some(choice_index) = read_choice(input, choices.len()) else {
            return;
        };

        let node_id = session.current_node_id().to_string();
        let outcome = session.choose(choice_index).await;

        match outcome {
            SelectOutcome { advanced: true, .. } => {
                offer_feedback(session, input, &node_id, choice_index).await;
            }
            SelectOutcome {
                advanced: false,
                awaiting_expansion: true,
            } => {
                println!("\nThe story has nothing more for you here - yet.");
                println!("Where it grows next is decided by feedback like yours.");
                offer_feedback(session, input, &node_id, choice_index).await;
                return;
            }
            SelectOutcome {
                advanced: false,
                awaiting_expansion: false,
            } => {
                println!("That is not one of the choices.");
            }
        }
    }
}

/// Read a 1-based selection, or None to quit.
fn read_choice(input: &mut Input<'_>, choice_count: usize) -> Option<usize> {
    loop {
        let answer = input.prompt(&format!(
            "\nEnter your choice (1-{choice_count}) or 'quit': "
        ))?;

        match answer.to_lowercase().as_str() {
            "quit" | "exit" | "q" => return None,
            answer => match answer.parse::<usize>() {
                Ok(n) if (1..=choice_count).contains(&n) => return Some(n - 1),
                _ => println!("Please enter a number between 1 and {choice_count}."),
            },
        }
    }
}

async fn offer_feedback(
    session: &mut StorySession,
    input: &mut Input<'_>,
    node_id: &str,
    choice_index: usize,
) {
    let Some(answer) = input.prompt("Rate that passage 1-5 (Enter to skip): ") else {
        return;
    };
    if answer.is_empty() {
        return;
    }

    let Ok(rating) = answer.parse::<u8>() else {
        println!("Skipping feedback: that was not a number.");
        return;
    };

    let comment = input
        .prompt("Any comment? (Enter to skip): ")
        .unwrap_or_default();

    match session
        .record_feedback(node_id, choice_index, rating, &comment)
        .await
    {
        Ok(()) => println!("Noted. The story remembers."),
        Err(e) => println!("Skipping feedback: {e}"),
    }
}
