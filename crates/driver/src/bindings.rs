use ethers::prelude::abigen;

// Generates the bindings for the `DisputeGameFactory` contract.
abigen!(
    DisputeGameFactory,
    r"[
        function gameCount() external view returns (uint256)
        function gameAtIndex(uint256 _index) external view returns (uint8, uint64, address)
    ]"
);

// Generates the bindings for the `FaultDisputeGame` contract.
abigen!(
    FaultDisputeGame,
    r"[
        function status() external view returns (uint8)
        function claimDataLen() external view returns (uint256)
        function claimData(uint256 _index) external view returns (uint32, bool, bytes32, uint128, uint128)
        function MAX_GAME_DEPTH() external view returns (uint256)
        function SPLIT_DEPTH() external view returns (uint256)
        function ABSOLUTE_PRESTATE() external view returns (bytes32)
        function VM() external view returns (address)
        function startingBlockNumber() external view returns (uint256)
        function l2BlockNumber() external view returns (uint256)
        function attack(uint256 _parentIndex, bytes32 _claim) external payable
        function defend(uint256 _parentIndex, bytes32 _claim) external payable
        function step(uint256 _claimIndex, bool _isAttack, bytes calldata _stateData, bytes calldata _proof) external
        function addLocalData(uint256 _ident, uint256 _partOffset) external
        function resolve() external returns (uint8)
    ]"
);

// Generates the bindings for the `MIPS` VM contract.
abigen!(
    MIPS,
    r"[
        function oracle() external view returns (address)
    ]"
);

// Generates the bindings for the `PreimageOracle` contract.
abigen!(
    PreimageOracle,
    r"[
        function loadKeccak256PreimagePart(uint256 _partOffset, bytes calldata _preimage) external
    ]"
);
