/// One step of the provisioning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    AzureAuth,
    EnsureOwner,
    CreateResourceGroup,
    CreateStorage,
    AssignBlobDataContributorRole,
    DeployLocal,
    VerifyLocal,
}

/// Ordering and display text for a stage.
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    pub id: Stage,
    pub label: &'static str,
}

/// The provisioning sequence, in execution order.
pub const STAGES: [StageDescriptor; 7] = [
    StageDescriptor {
        id: Stage::AzureAuth,
        label: "Preparing to start resource creation for ACTLabs...",
    },
    StageDescriptor {
        id: Stage::EnsureOwner,
        label: "Ensuring you have the necessary permissions to create resources...",
    },
    StageDescriptor {
        id: Stage::CreateResourceGroup,
        label: "Creating the ACTLabs resource group...",
    },
    StageDescriptor {
        id: Stage::CreateStorage,
        label: "Creating the ACTLabs storage account...",
    },
    StageDescriptor {
        id: Stage::AssignBlobDataContributorRole,
        label: "Assigning the Blob Data Contributor role to the ACTLabs storage account...",
    },
    StageDescriptor {
        id: Stage::DeployLocal,
        label: "Deploying the ACTLabs server components locally...",
    },
    StageDescriptor {
        id: Stage::VerifyLocal,
        label: "Verifying the ACTLabs server components are running locally...",
    },
];

impl Stage {
    fn descriptor(&self) -> &'static StageDescriptor {
        // STAGES holds exactly one entry per variant, in declaration order
        &STAGES[self.index()]
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        self.descriptor().label
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Stage::AzureAuth => "Azure sign-in",
            Stage::EnsureOwner => "Owner check",
            Stage::CreateResourceGroup => "Resource group",
            Stage::CreateStorage => "Storage account",
            Stage::AssignBlobDataContributorRole => "Blob role assignment",
            Stage::DeployLocal => "Local deploy",
            Stage::VerifyLocal => "Local verify",
        }
    }

    pub fn next(&self) -> Option<Stage> {
        STAGES.get(self.index() + 1).map(|d| d.id)
    }
}
