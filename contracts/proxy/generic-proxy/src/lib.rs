#![no_std]

/// Generate a forwarding proxy contract.
///
/// The proxy instance keeps one stable address while its target contract can
/// be replaced by developers. Every listed entrypoint is forwarded to the
/// target verbatim: parameter bytes, attached amount and the returned bytes
/// are relayed unchanged, and a rejection by the target is surfaced with the
/// target's own error code.
#[macro_export]
macro_rules! proxy_contract {
    (
        contract: $contract:literal
        $($vis:vis $rust_func:ident => $contract_func:literal($($contract_param:literal)?);)+
    ) => {
        use ::commons::{ContractError, CustomContractError};
        use ::concordium_std::*;

        type ContractResult<T> = Result<T, ContractError>;

        #[derive(Serialize, SchemaType)]
        pub struct InitParameter {
            target: ContractAddress,
            admins: HashSet<Address>,
            developers: HashSet<Address>,
        }

        #[derive(Serialize, SchemaType)]
        pub struct UserUpdateList {
            updates: Vec<(Address, RightsUpdate)>,
        }

        #[derive(Serialize, SchemaType)]
        enum RightsUpdate {
            Add,
            Remove,
        }

        #[derive(Serialize, SchemaType)]
        pub struct TargetContract {
            target: ContractAddress,
        }

        #[derive(Serialize, SchemaType)]
        pub struct State {
            target: ContractAddress,
            admins: HashSet<Address>,
            developers: HashSet<Address>,
        }

        impl State {
            fn has_admin_rights(&self, addr: &Address) -> bool {
                self.admins.contains(addr)
            }

            fn has_dev_rights(&self, addr: &Address) -> bool {
                self.admins.contains(addr) || self.developers.contains(addr)
            }
        }

        /// Bytes relayed from the target contract, written back verbatim.
        pub struct RawReturnValue(Vec<u8>);

        impl Serial for RawReturnValue {
            fn serial<W: Write>(&self, out: &mut W) -> Result<(), W::Err> {
                out.write_all(&self.0)
            }
        }

        fn read_parameter(cursor: &mut impl HasParameter) -> ParseResult<Vec<u8>> {
            let size = cursor.size() as usize;
            let mut parameter = vec![0u8; size];
            cursor.read_exact(&mut parameter)?;
            Ok(parameter)
        }

        fn relay_response<V: Read>(response: Option<V>) -> ParseResult<RawReturnValue> {
            let mut bytes = Vec::new();
            if let Some(mut response) = response {
                let mut buffer = [0u8; 256];
                loop {
                    let read = response.read(&mut buffer)?;
                    if read == 0 {
                        break;
                    }
                    bytes.extend_from_slice(&buffer[..read]);
                }
            }
            Ok(RawReturnValue(bytes))
        }

        // Rejections keep the target's error code; everything else means the
        // target could not be reached as a contract.
        fn relay_error<V>(error: CallContractError<V>) -> Reject {
            match error {
                CallContractError::LogicReject { reason, .. } => Reject::new(reason)
                    .unwrap_or_else(|| CustomContractError::InvokeContractError.into()),
                _ => CustomContractError::InvokeContractError.into(),
            }
        }

        /// Initialize proxy contract instance with originator as only admin
        #[init(contract = $contract, parameter = "InitParameter")]
        pub fn contract_init(ctx: &impl HasInitContext) -> InitResult<State> {
            let mut params: InitParameter = ctx.parameter_cursor().get()?;
            if params.admins.is_empty() {
                params.admins.insert(Address::Account(ctx.init_origin()));
            }
            let state = State {
                target: params.target,
                admins: params.admins,
                developers: params.developers,
            };
            Ok(state)
        }

        #[receive(
            contract = $contract,
            name = "proxyUpgradeTarget",
            parameter = "TargetContract",
            mutable
        )]
        pub fn contract_upgrade_target<S: HasStateApi>(
            ctx: &impl HasReceiveContext,
            host: &mut impl HasHost<State, StateApiType = S>,
        ) -> ContractResult<()> {
            if host.state().has_dev_rights(&ctx.sender()) {
                let params: TargetContract = ctx.parameter_cursor().get()?;
                host.state_mut().target = params.target;
                Ok(())
            } else {
                Err(ContractError::Unauthorized)
            }
        }

        #[receive(
            contract = $contract,
            name = "proxyUpdateAdmins",
            parameter = "UserUpdateList",
            mutable
        )]
        pub fn contract_update_admins<S: HasStateApi>(
            ctx: &impl HasReceiveContext,
            host: &mut impl HasHost<State, StateApiType = S>,
        ) -> ContractResult<()> {
            if host.state().has_admin_rights(&ctx.sender()) {
                let params: UserUpdateList = ctx.parameter_cursor().get()?;
                let state = host.state_mut();
                for (user, update) in params.updates {
                    match update {
                        RightsUpdate::Add => state.admins.insert(user),
                        RightsUpdate::Remove => state.admins.remove(&user),
                    };
                }
                Ok(())
            } else {
                Err(ContractError::Unauthorized)
            }
        }

        #[receive(
            contract = $contract,
            name = "proxyUpdateDevelopers",
            parameter = "UserUpdateList",
            mutable
        )]
        pub fn contract_update_devs<S: HasStateApi>(
            ctx: &impl HasReceiveContext,
            host: &mut impl HasHost<State, StateApiType = S>,
        ) -> ContractResult<()> {
            if host.state().has_dev_rights(&ctx.sender()) {
                let params: UserUpdateList = ctx.parameter_cursor().get()?;
                let state = host.state_mut();
                for (user, update) in params.updates {
                    match update {
                        RightsUpdate::Add => state.developers.insert(user),
                        RightsUpdate::Remove => state.developers.remove(&user),
                    };
                }
                Ok(())
            } else {
                Err(ContractError::Unauthorized)
            }
        }

        $(
            /// Forward the call to the target contract verbatim.
            #[receive(
                contract = $contract,
                name = $contract_func,
                $(parameter = $contract_param,)?
                mutable,
                payable
            )]
            $vis fn $rust_func<S: HasStateApi>(
                ctx: &impl HasReceiveContext,
                host: &mut impl HasHost<State, StateApiType = S>,
                amount: Amount,
            ) -> ReceiveResult<RawReturnValue> {
                let parameter = read_parameter(&mut ctx.parameter_cursor())?;
                let target = host.state().target;

                let (_, response) = host
                    .invoke_contract_raw(
                        &target,
                        Parameter(&parameter),
                        EntrypointName::new_unchecked($contract_func),
                        amount,
                    )
                    .map_err(relay_error)?;

                Ok(relay_response(response)?)
            }
        )+
    };
    (contract: $contract:literal) => {
        compile_error!("Forwarded functions must be specified for a proxy contract");
    }
}
