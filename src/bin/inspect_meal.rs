use anyhow::{Context, Result, bail};
use colored::*;
use std::path::Path;
use std::time::Duration;

use allergy_inspector::assessment::{IngredientAssessment, SafetyStatus};
use allergy_inspector::build_assistant;
use allergy_inspector::config::Config;
use allergy_inspector::conversation::{InputMethod, Session, Speaker, TranscriptMessage};
use allergy_inspector::media::ImageInput;
use allergy_inspector::prompts::PromptSet;

const USAGE: &str = "usage: inspect_meal <image path or http(s) url> <allergy,allergy,...> [--video]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let want_video = args.iter().any(|a| a == "--video");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();
    let [image_arg, allergies_arg] = positional.as_slice() else {
        bail!(USAGE);
    };

    let image = if image_arg.starts_with("http://") || image_arg.starts_with("https://") {
        ImageInput::from_url(image_arg)?
    } else {
        ImageInput::from_path(Path::new(image_arg.as_str()))?
    };

    let config = Config::load().context("Failed to load configuration")?;
    let prompts = PromptSet::load(&config.prompts.dir).context("Failed to load prompt files")?;
    let assistant = build_assistant(&config, prompts)?;

    let mut session = Session::new();
    session.profile.select_allergies(allergies_arg.split(','));
    if session.profile.allergies.is_empty() {
        bail!("at least one allergy is required\n{USAGE}");
    }

    assistant.choose_input(&mut session, InputMethod::Upload)?;
    print_messages(&assistant.submit_image(&mut session, image).await?);
    print_messages(&assistant.check_allergens(&mut session).await?);

    if want_video {
        print_messages(&assistant.request_video(&mut session)?);
        // The worker stops at its own poll ceiling
        while assistant.video_outcome(&session).is_none() {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        print_messages(&assistant.poll_video(&mut session)?);
    }

    Ok(())
}

fn print_messages(messages: &[TranscriptMessage]) {
    for message in messages {
        if let Some(assessment) = &message.assessment {
            print_card(assessment);
            continue;
        }
        let who = match message.speaker {
            Speaker::User => "you".bright_blue(),
            Speaker::Bot => "bot".bright_cyan(),
            Speaker::Doctor => "doctor".bright_magenta(),
        };
        if message.warning {
            println!("{} {} {}", who, "⚠️".bright_yellow(), message.text.yellow());
        } else {
            println!("{} {}", who, message.text);
        }
    }
}

fn print_card(assessment: &IngredientAssessment) {
    let label = match assessment.status {
        SafetyStatus::Dangerous => assessment.status.label().red().bold(),
        SafetyStatus::Alert => assessment.status.label().yellow().bold(),
        SafetyStatus::Safe => assessment.status.label().green().bold(),
    };
    println!(
        "   {} {} {}: {}",
        assessment.emoji,
        label,
        assessment.ingredient.bold(),
        assessment.description
    );
}
