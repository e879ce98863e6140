use clap::{Parser, Subcommand};
use hms_core::config::{
    amendment_policy_from_env_value, busy_timeout_from_env_value, database_path_from_env_value,
};
use hms_core::{
    provision_database, CoreConfig, DoctorService, MedicalRecordService, NewMedicalRecord,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hms")]
#[command(about = "HMS medical records CLI")]
struct Cli {
    /// SQLite database file (defaults to HMS_DATABASE_PATH, then hms.db)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Provision,
    /// Register a doctor, or update their name and specialization
    AddDoctor {
        /// Doctor id (the user id issued by the authentication provider)
        id: String,
        name: String,
        specialization: String,
    },
    /// Create the medical record for a completed appointment
    CreateRecord {
        patient_id: String,
        doctor_id: String,
        appointment_id: i64,
        /// Initial clinical notes
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        treatment_plan: Option<String>,
        #[arg(long)]
        prescriptions: Option<String>,
        #[arg(long)]
        lab_request: Option<String>,
    },
    /// Commit a new version of a record's clinical notes
    CommitNote {
        medical_record_id: i64,
        /// Authoring doctor id
        doctor_id: String,
        notes: String,
        /// Reason for the change (optional)
        #[arg(long)]
        reason: Option<String>,
    },
    /// Show a record's clinical note history, newest first
    History { medical_record_id: i64 },
    /// Repair record notes that drifted from their current version
    Reconcile {
        /// Only reconcile this record
        #[arg(long)]
        record_id: Option<i64>,
    },
}

fn resolve_config(
    database: Option<PathBuf>,
) -> Result<Arc<CoreConfig>, Box<dyn std::error::Error>> {
    let database_path = database.unwrap_or_else(|| {
        database_path_from_env_value(std::env::var("HMS_DATABASE_PATH").ok())
    });
    let busy_timeout = busy_timeout_from_env_value(std::env::var("HMS_BUSY_TIMEOUT_MS").ok())?;
    let policy = amendment_policy_from_env_value(std::env::var("HMS_NOTE_AMENDMENT_POLICY").ok())?;
    Ok(Arc::new(CoreConfig::new(database_path, busy_timeout, policy)?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("No command given. Use --help for usage.");
        return Ok(());
    };
    let cfg = resolve_config(cli.database)?;

    match command {
        Commands::Provision => match provision_database(&cfg) {
            Ok(state) => println!(
                "Provisioned {} (schema: {})",
                cfg.database_path().display(),
                state.as_str()
            ),
            Err(e) => eprintln!("Error provisioning database: {}", e),
        },
        Commands::AddDoctor {
            id,
            name,
            specialization,
        } => match DoctorService::new(cfg).register(&id, &name, &specialization) {
            Ok(doctor) => println!("Registered doctor {} ({})", doctor.id, doctor.name),
            Err(e) => eprintln!("Error registering doctor: {}", e),
        },
        Commands::CreateRecord {
            patient_id,
            doctor_id,
            appointment_id,
            notes,
            treatment_plan,
            prescriptions,
            lab_request,
        } => {
            let new = NewMedicalRecord {
                patient_id,
                doctor_id,
                appointment_id,
                notes,
                treatment_plan,
                prescriptions,
                lab_request,
            };
            match MedicalRecordService::new(cfg).create(new) {
                Ok(service) => println!(
                    "Created medical record with ID: {}",
                    service.medical_record_id()
                ),
                Err(e) => eprintln!("Error creating medical record: {}", e),
            }
        }
        Commands::CommitNote {
            medical_record_id,
            doctor_id,
            notes,
            reason,
        } => {
            let service = MedicalRecordService::with_id(cfg, medical_record_id);
            match service.commit_note(&doctor_id, &notes, reason.as_deref()) {
                Ok(version) => println!(
                    "Committed version {} of medical record {}",
                    version.version_number, version.medical_record_id
                ),
                Err(e) => eprintln!("Error committing clinical notes: {}", e),
            }
        }
        Commands::History { medical_record_id } => {
            match MedicalRecordService::with_id(cfg, medical_record_id).list_history() {
                Ok(history) if history.is_empty() => println!("No clinical notes found."),
                Ok(history) => {
                    for entry in history {
                        let v = &entry.version;
                        println!(
                            "v{}{} {} by {} ({}): {}",
                            v.version_number,
                            if v.is_current { "*" } else { "" },
                            v.created_at.to_rfc3339(),
                            entry.doctor_name.as_deref().unwrap_or(&v.doctor_id),
                            v.change_reason.as_deref().unwrap_or("-"),
                            v.notes
                        );
                    }
                }
                Err(e) => eprintln!("Error reading clinical notes: {}", e),
            }
        }
        Commands::Reconcile { record_id: Some(id) } => {
            match MedicalRecordService::with_id(cfg, id).reconcile() {
                Ok(outcome) => println!("Medical record {}: {:?}", id, outcome),
                Err(e) => eprintln!("Error reconciling medical record {}: {}", id, e),
            }
        }
        Commands::Reconcile { record_id: None } => {
            match MedicalRecordService::new(cfg).reconcile_all() {
                Ok(report) => println!(
                    "Examined {} records: {} repaired, {} without a current version",
                    report.examined, report.repaired, report.without_current_version
                ),
                Err(e) => eprintln!("Error reconciling medical records: {}", e),
            }
        }
    }

    Ok(())
}
